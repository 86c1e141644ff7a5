//! Service registry: the immutable endpoint table.
//!
//! Built once from configuration. Adding a service is a config entry;
//! the auth style comes from the table, never from a name check in code.

use crate::config::{self, AuthScheme, ServiceConfig};
use std::collections::HashMap;

/// A resolved, immutable service endpoint.
#[derive(Debug, Clone)]
pub struct ServiceEndpoint {
    pub name: String,
    /// Base URL without a trailing slash.
    pub base_url: String,
    pub auth: AuthScheme,
    pub credential: Option<String>,
}

impl ServiceEndpoint {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        auth: AuthScheme,
        credential: Option<String>,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            name: name.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            credential,
        }
    }

    /// `{baseUrl}/{action}`
    pub fn url_for(&self, action: &str) -> String {
        format!("{}/{}", self.base_url, action.trim_start_matches('/'))
    }

    /// The single credential header for this endpoint, if one is configured.
    pub fn auth_header(&self) -> Option<(String, String)> {
        let cred = self.credential.as_ref()?;
        Some(match &self.auth {
            AuthScheme::Bearer => ("authorization".to_string(), format!("Bearer {}", cred)),
            AuthScheme::Header(name) => (name.to_ascii_lowercase(), cred.clone()),
        })
    }
}

/// Endpoints keyed by service name, in configuration order.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    endpoints: HashMap<String, ServiceEndpoint>,
    order: Vec<String>,
}

impl ServiceRegistry {
    /// Build from config, resolving each credential once.
    pub fn from_config(services: &[ServiceConfig]) -> Self {
        let endpoints = services.iter().map(|svc| {
            ServiceEndpoint::new(
                &svc.name,
                &svc.base_url,
                svc.auth.clone(),
                config::resolve_credential(svc),
            )
        });
        let registry = Self::from_endpoints(endpoints);
        log::info!(
            "[RPC] {} services registered: [{}]",
            registry.len(),
            registry.order.join(", ")
        );
        registry
    }

    pub fn from_endpoints(endpoints: impl IntoIterator<Item = ServiceEndpoint>) -> Self {
        let mut registry = Self::default();
        for endpoint in endpoints {
            if registry.endpoints.contains_key(&endpoint.name) {
                log::warn!(
                    "[RPC] Duplicate service '{}'; later entry wins",
                    endpoint.name
                );
            } else {
                registry.order.push(endpoint.name.clone());
            }
            registry.endpoints.insert(endpoint.name.clone(), endpoint);
        }
        registry
    }

    pub fn get(&self, name: &str) -> Option<&ServiceEndpoint> {
        self.endpoints.get(name)
    }

    pub fn names(&self) -> &[String] {
        &self.order
    }

    /// Endpoints in configuration order.
    pub fn endpoints(&self) -> impl Iterator<Item = &ServiceEndpoint> {
        self.order.iter().filter_map(|n| self.endpoints.get(n))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
