//! Process-local correlation ids for RPC calls and bridge messages.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Generates `<prefix>-<epoch_ms>-<n>` ids, unique within the process.
#[derive(Debug)]
pub struct CorrelationIds {
    prefix: &'static str,
    epoch_ms: u128,
    next: AtomicU64,
}

impl CorrelationIds {
    pub fn new(prefix: &'static str) -> Self {
        let epoch_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        Self {
            prefix,
            epoch_ms,
            next: AtomicU64::new(1),
        }
    }

    pub fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        format!("{}-{}-{}", self.prefix, self.epoch_ms, n)
    }
}

/// Milliseconds since the Unix epoch, for message timestamps.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
