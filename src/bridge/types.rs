//! Bridge wire types: outbound LLM requests and inbound frames.

use serde::Serialize;
use serde_json::Value;

// ── Outbound ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct OutboundMessage {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub id: String,
    pub payload: LlmRequestPayload,
    pub timestamp: u64,
    pub metadata: MessageMetadata,
}

#[derive(Debug, Clone, Serialize)]
pub struct LlmRequestPayload {
    pub prompt: String,
    pub provider: String,
    pub options: LlmOptions,
    pub context: LlmContext,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmOptions {
    pub temperature: f32,
    pub stream: bool,
    pub task_type: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmContext {
    pub selected_text: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageMetadata {
    pub source: String,
}

// ── Inbound ─────────────────────────────────────────────────────────

/// Events delivered to the bridge consumer.
///
/// `Opened`, `Closed` and `Exhausted` come from the manager itself; the
/// rest are decoded from server frames.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    Opened,
    Closed { reason: String },
    /// Reconnect ceiling reached; waiting for an explicit reconnect.
    Exhausted { attempts: u32 },
    /// Server-side lifecycle notice (`connected`, `connection_ack`).
    Lifecycle { kind: String, payload: Value },
    Chunk { id: Option<String>, content: String },
    Done { id: Option<String> },
    Error { id: Option<String>, message: String },
}

/// Decode one text frame.
///
/// `Ok(None)` for well-formed frames of a type we don't handle;
/// `Err` for anything malformed.
pub fn parse_frame(text: &str) -> Result<Option<BridgeEvent>, String> {
    let value: Value = serde_json::from_str(text).map_err(|e| format!("invalid JSON: {}", e))?;
    let obj = value
        .as_object()
        .ok_or_else(|| "frame is not a JSON object".to_string())?;
    let kind = obj
        .get("type")
        .and_then(|t| t.as_str())
        .ok_or_else(|| "frame has no string 'type'".to_string())?;
    let id = obj.get("id").and_then(|v| v.as_str()).map(|s| s.to_string());

    let event = match kind {
        "connected" | "connection_ack" => BridgeEvent::Lifecycle {
            kind: kind.to_string(),
            payload: obj.get("payload").cloned().unwrap_or(Value::Null),
        },
        "llm_chunk" | "chunk" | "token" => {
            let content = text_field(&value, &["content", "delta"])
                .ok_or_else(|| format!("'{}' frame has no content", kind))?;
            BridgeEvent::Chunk { id, content }
        }
        "llm_done" | "done" | "end" => BridgeEvent::Done { id },
        "error" => BridgeEvent::Error {
            id,
            message: text_field(&value, &["error", "message"])
                .unwrap_or_else(|| "unknown bridge error".to_string()),
        },
        other => {
            log::debug!("[BRIDGE] Ignoring frame type '{}'", other);
            return Ok(None);
        }
    };
    Ok(Some(event))
}

/// First string found under `keys`, at the top level or inside `payload`.
fn text_field(frame: &Value, keys: &[&str]) -> Option<String> {
    let payload = frame.get("payload");
    keys.iter().find_map(|k| {
        frame
            .get(*k)
            .and_then(|v| v.as_str())
            .or_else(|| payload.and_then(|p| p.get(*k)).and_then(|v| v.as_str()))
            .map(|s| s.to_string())
    })
}
