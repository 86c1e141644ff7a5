//! RPC envelope types and response normalization.
//!
//! Services answer in one of two legacy shapes:
//! - `{ "success": bool, "data": ..., "error": ... }`
//! - `{ "status": "ok" | "error", "data": ..., "error": ... }`
//!
//! Both are decoded into [`ResponseShape`] first, then funnelled through
//! [`normalize`] into a single [`RpcResult`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol version stamped on every outgoing envelope.
pub const PROTOCOL_VERSION: &str = "mcp.v1";

/// Status value that means success in the status-tagged shape.
pub const STATUS_OK: &str = "ok";

// ── Outgoing ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcEnvelope<'a> {
    pub version: &'static str,
    pub service: &'a str,
    pub request_id: &'a str,
    pub action: &'a str,
    pub payload: Value,
}

impl<'a> RpcEnvelope<'a> {
    pub fn new(service: &'a str, request_id: &'a str, action: &'a str, payload: Value) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            service,
            request_id,
            action,
            payload,
        }
    }
}

// ── Incoming ────────────────────────────────────────────────────────

/// The accepted response encodings, tried in declaration order.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ResponseShape {
    /// `{success, data, error}`; may also carry a `status` field.
    Flagged {
        success: bool,
        #[serde(default)]
        status: Option<String>,
        #[serde(default)]
        data: Option<Value>,
        #[serde(default)]
        error: Option<Value>,
    },
    /// `{status, data, error}`
    StatusTagged {
        status: String,
        #[serde(default)]
        data: Option<Value>,
        #[serde(default)]
        error: Option<Value>,
    },
    /// Anything else: an object without either flag, or a bare value.
    Untyped(Value),
}

/// Normalized outcome of one call.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcResult {
    pub success: bool,
    pub data: Value,
    pub error: Option<String>,
}

/// Collapse any accepted shape into an [`RpcResult`].
///
/// A response is a failure when it has an explicit `success: false`, a
/// `status` other than `"ok"`, or an error payload with no data and no
/// explicit success flag.
pub fn normalize(shape: ResponseShape) -> RpcResult {
    let (success_flag, status, data, error) = match shape {
        ResponseShape::Flagged {
            success,
            status,
            data,
            error,
        } => (Some(success), status, data, error),
        ResponseShape::StatusTagged {
            status,
            data,
            error,
        } => (None, Some(status), data, error),
        ResponseShape::Untyped(Value::Object(mut map)) => {
            let data = map.remove("data").filter(|v| !v.is_null());
            let error = map.remove("error").filter(|v| !v.is_null());
            match (data, error) {
                (None, None) => (None, None, Some(Value::Object(map)), None),
                (data, error) => (None, None, data, error),
            }
        }
        ResponseShape::Untyped(other) => (None, None, Some(other), None),
    };

    let error = error.filter(|v| !v.is_null());
    let failed = success_flag == Some(false)
        || status.as_deref().is_some_and(|s| s != STATUS_OK)
        || (error.is_some() && data.is_none() && success_flag.is_none());

    if failed {
        let message = error
            .as_ref()
            .map(error_message)
            .or_else(|| status.clone().filter(|s| s != STATUS_OK))
            .unwrap_or_else(|| "request failed".to_string());
        RpcResult {
            success: false,
            data: data.unwrap_or(Value::Null),
            error: Some(message),
        }
    } else {
        RpcResult {
            success: true,
            data: data.unwrap_or(Value::Null),
            error: None,
        }
    }
}

/// Pull a human-readable message out of an error payload.
fn error_message(error: &Value) -> String {
    match error {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("message")
            .and_then(|m| m.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| error.to_string()),
        other => other.to_string(),
    }
}

/// Decode a raw body into a normalized result.
pub fn decode_body(body: &str) -> Result<RpcResult, serde_json::Error> {
    let shape: ResponseShape = serde_json::from_str(body)?;
    Ok(normalize(shape))
}
