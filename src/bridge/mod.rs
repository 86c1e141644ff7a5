//! Bridge domain: the persistent streaming connection to the reasoning
//! backend.
//!
//! - **types**: outbound `llm_request` message, inbound frame decoding
//! - **reconnect**: backoff + attempt ceiling bookkeeping
//! - **connection**: BridgeManager: connect, send, reconnect state machine

pub mod connection;
pub mod reconnect;
pub mod types;

pub use connection::{BridgeManager, BridgeState, BridgeStatus};
pub use types::BridgeEvent;
