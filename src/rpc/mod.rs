//! RPC domain: calls to independently hosted, versioned services.
//!
//! - **types**: request envelope, dual-shape response decoding, normalization
//! - **registry**: ServiceRegistry: immutable endpoint table + auth headers
//! - **client**: RpcClient: `call(service, action, payload)`
//! - **health**: concurrent health sweep across all endpoints

pub mod client;
pub mod health;
pub mod registry;
pub mod types;

pub use client::RpcClient;
pub use registry::{ServiceEndpoint, ServiceRegistry};
pub use types::RpcResult;
