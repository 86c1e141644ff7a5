//! The execution engine seam.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::automation::events::{EngineEvent, EngineEvents};
use crate::automation::state::{AutomationState, FinalState};
use crate::error::{Error, Result};
use crate::rpc::RpcClient;

/// Runs an automation to completion or to its next blocking question.
///
/// Implementations stream tokens and progress through `events` while they
/// work and drop the sender when they return.
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    async fn execute(&self, state: AutomationState, events: EngineEvents) -> Result<FinalState>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteExecution {
    #[serde(default)]
    events: Vec<EngineEvent>,
    final_state: AutomationState,
}

/// An engine hosted behind the RPC client. The service answers one
/// `execute` call with the buffered events and the final state.
pub struct RemoteEngine {
    rpc: Arc<RpcClient>,
    service: String,
}

impl RemoteEngine {
    pub fn new(rpc: Arc<RpcClient>, service: impl Into<String>) -> Self {
        Self {
            rpc,
            service: service.into(),
        }
    }
}

#[async_trait]
impl ExecutionEngine for RemoteEngine {
    async fn execute(&self, state: AutomationState, events: EngineEvents) -> Result<FinalState> {
        let payload = serde_json::to_value(&state)?;
        let data = self.rpc.call_data(&self.service, "execute", payload).await?;
        let run: RemoteExecution = serde_json::from_value(data)
            .map_err(|e| Error::Engine(format!("unexpected execute response: {}", e)))?;

        log::debug!(
            "[AUTOMATION] '{}' returned {} events",
            self.service,
            run.events.len()
        );
        for event in run.events {
            if events.send(event).is_err() {
                break;
            }
        }
        Ok(run.final_state)
    }
}
