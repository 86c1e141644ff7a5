//! Error taxonomy for the control plane.
//!
//! Plan and step failures are not errors here: they travel as
//! progress events (see `automation::events`).

use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// No endpoint registered under this name. No I/O was attempted.
    #[error("unknown service '{0}'")]
    UnknownService(String),

    #[error("'{service}' did not respond within {}ms", after.as_millis())]
    Timeout { service: String, after: Duration },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("'{service}' reported failure: {message}")]
    RemoteFailure { service: String, message: String },

    #[error("could not decode response: {0}")]
    Decode(String),

    /// Automatic reconnection halted; only an explicit reconnect resumes it.
    #[error("bridge reconnect ceiling reached after {attempts} attempts")]
    ConnectionExhausted { attempts: u32 },

    #[error("bridge is not connected")]
    NotConnected,

    #[error("bridge error: {0}")]
    Bridge(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("execution failed: {0}")]
    Engine(String),

    #[error("clipboard error: {0}")]
    Clipboard(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Decode(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
