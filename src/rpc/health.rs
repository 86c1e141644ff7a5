//! Endpoint health checks.
//!
//! Each endpoint is probed on two well-known paths. Probes run
//! concurrently and independently: one endpoint hanging or refusing
//! connections never affects another's verdict.

use crate::rpc::client::RpcClient;
use crate::rpc::registry::ServiceEndpoint;
use serde_json::Value;
use std::time::Instant;

/// True if a health body carries one of the accepted positive signatures:
/// `status` of `up`, `healthy` or `ok`, or `success: true`.
pub fn is_healthy_body(body: &Value) -> bool {
    if body.get("success").and_then(|v| v.as_bool()) == Some(true) {
        return true;
    }
    body.get("status")
        .and_then(|v| v.as_str())
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "up" | "healthy" | "ok"))
        .unwrap_or(false)
}

impl RpcClient {
    /// Probe one endpoint. Tries each health path in order; the first
    /// positive body wins.
    pub async fn probe(&self, endpoint: &ServiceEndpoint) -> bool {
        for path in &self.health_paths {
            let url = format!("{}{}", endpoint.base_url, path);
            let mut request = self.http.get(&url);
            if let Some((name, value)) = endpoint.auth_header() {
                request = request.header(name, value);
            }

            let outcome = tokio::time::timeout(self.health_timeout, async {
                let resp = request.send().await.map_err(|e| e.to_string())?;
                resp.json::<Value>().await.map_err(|e| e.to_string())
            })
            .await;

            match outcome {
                Ok(Ok(body)) if is_healthy_body(&body) => return true,
                Ok(Ok(body)) => {
                    log::debug!("[HEALTH] {} {}: unrecognised body {}", endpoint.name, path, body)
                }
                Ok(Err(e)) => log::debug!("[HEALTH] {} {}: {}", endpoint.name, path, e),
                Err(_) => log::debug!(
                    "[HEALTH] {} {}: timed out after {}ms",
                    endpoint.name,
                    path,
                    self.health_timeout.as_millis()
                ),
            }
        }
        false
    }

    /// Probe every registered endpoint concurrently and return the names
    /// of the healthy ones, in configuration order.
    pub async fn healthy_services(&self) -> Vec<String> {
        let start = Instant::now();
        let endpoints: Vec<&ServiceEndpoint> = self.registry.endpoints().collect();
        let verdicts =
            futures::future::join_all(endpoints.iter().map(|ep| self.probe(ep))).await;

        let healthy: Vec<String> = endpoints
            .iter()
            .zip(verdicts)
            .filter_map(|(ep, ok)| {
                if !ok {
                    log::warn!("[HEALTH] '{}' is unhealthy", ep.name);
                }
                ok.then(|| ep.name.clone())
            })
            .collect();

        log::info!(
            "[HEALTH] {}/{} services healthy in {}ms",
            healthy.len(),
            endpoints.len(),
            start.elapsed().as_millis()
        );
        healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_all_four_signatures() {
        assert!(is_healthy_body(&json!({"status": "up"})));
        assert!(is_healthy_body(&json!({"status": "healthy"})));
        assert!(is_healthy_body(&json!({"status": "ok"})));
        assert!(is_healthy_body(&json!({"success": true})));
    }

    #[test]
    fn rejects_other_bodies() {
        assert!(!is_healthy_body(&json!({"status": "down"})));
        assert!(!is_healthy_body(&json!({"success": false})));
        assert!(!is_healthy_body(&json!("ok")));
        assert!(!is_healthy_body(&json!({})));
    }
}
