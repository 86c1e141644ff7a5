//! RPC client: versioned JSON envelopes over HTTP POST.
//!
//! Each call is independent: resolve the endpoint, stamp a correlation
//! id, POST `{baseUrl}/{action}`, decode whichever response shape the
//! service speaks, and normalize it.

use crate::error::{Error, Result};
use crate::ids::CorrelationIds;
use crate::rpc::registry::{ServiceEndpoint, ServiceRegistry};
use crate::rpc::types::{self, RpcEnvelope, RpcResult};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for a single health probe request.
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(3);

pub struct RpcClient {
    pub(crate) http: reqwest::Client,
    pub(crate) registry: Arc<ServiceRegistry>,
    pub(crate) timeout: Duration,
    pub(crate) health_timeout: Duration,
    pub(crate) health_paths: Vec<String>,
    ids: CorrelationIds,
}

impl RpcClient {
    pub fn new(registry: Arc<ServiceRegistry>) -> Self {
        Self {
            http: reqwest::Client::new(),
            registry,
            timeout: DEFAULT_TIMEOUT,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
            health_paths: vec!["/health".to_string(), "/api/health".to_string()],
            ids: CorrelationIds::new("rpc"),
        }
    }

    pub fn from_config(registry: Arc<ServiceRegistry>, config: &crate::config::AppConfig) -> Self {
        Self::new(registry)
            .with_timeout(Duration::from_millis(config.rpc_timeout_ms))
            .with_health_timeout(Duration::from_millis(config.health_timeout_ms))
            .with_health_paths(config.health_paths.clone())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    pub fn with_health_paths(mut self, paths: Vec<String>) -> Self {
        if !paths.is_empty() {
            self.health_paths = paths;
        }
        self
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.registry
    }

    /// Call `action` on `service` with `payload`.
    ///
    /// Fails with `UnknownService` before any I/O if the service is not
    /// registered. A decoded failure body becomes `RemoteFailure`.
    pub async fn call(&self, service: &str, action: &str, payload: Value) -> Result<RpcResult> {
        let endpoint = self
            .registry
            .get(service)
            .ok_or_else(|| Error::UnknownService(service.to_string()))?;

        let request_id = self.ids.next_id();
        let envelope = RpcEnvelope::new(service, &request_id, action, payload);
        let start = Instant::now();

        let (status, body) = tokio::time::timeout(self.timeout, self.post(endpoint, action, &envelope))
            .await
            .map_err(|_| {
                log::warn!(
                    "[RPC] {}/{} ({}) timed out after {}ms",
                    service,
                    action,
                    request_id,
                    self.timeout.as_millis()
                );
                Error::Timeout {
                    service: service.to_string(),
                    after: self.timeout,
                }
            })??;

        log::info!(
            "[RPC] {}/{} ({}) → HTTP {} in {}ms",
            service,
            action,
            request_id,
            status.as_u16(),
            start.elapsed().as_millis()
        );

        let result = match types::decode_body(&body) {
            Ok(r) => r,
            Err(e) if !status.is_success() => {
                log::debug!("[RPC] Undecodable error body from '{}': {}", service, e);
                let preview: String = body.chars().take(200).collect();
                return Err(Error::Transport(format!(
                    "HTTP {} from '{}': {}",
                    status, service, preview
                )));
            }
            Err(e) => return Err(Error::Decode(format!("'{}' {}: {}", service, action, e))),
        };

        if !result.success {
            let message = result
                .error
                .clone()
                .unwrap_or_else(|| "request failed".to_string());
            log::warn!("[RPC] {}/{} failed: {}", service, action, message);
            return Err(Error::RemoteFailure {
                service: service.to_string(),
                message,
            });
        }

        if !status.is_success() {
            return Err(Error::RemoteFailure {
                service: service.to_string(),
                message: format!("HTTP {}", status),
            });
        }

        Ok(result)
    }

    /// Convenience wrapper returning only the data field.
    pub async fn call_data(&self, service: &str, action: &str, payload: Value) -> Result<Value> {
        self.call(service, action, payload).await.map(|r| r.data)
    }

    async fn post(
        &self,
        endpoint: &ServiceEndpoint,
        action: &str,
        envelope: &RpcEnvelope<'_>,
    ) -> Result<(reqwest::StatusCode, String)> {
        let mut request = self
            .http
            .post(endpoint.url_for(action))
            .header("content-type", "application/json")
            .header("accept", "application/json")
            .json(envelope);
        if let Some((name, value)) = endpoint.auth_header() {
            request = request.header(name, value);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| Error::Transport(format!("'{}' request failed: {}", endpoint.name, e)))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::Transport(format!("'{}' body read failed: {}", endpoint.name, e)))?;
        Ok((status, body))
    }
}
