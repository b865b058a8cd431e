//! Request id generation.

use std::sync::atomic::{AtomicU64, Ordering};

/// Process-local JSON-RPC request id sequence.
///
/// Ids start at 1 and are never reused. They exist for correlating
/// requests and responses in logs, not for ordering.
#[derive(Debug)]
pub struct RequestIds {
    last: AtomicU64,
}

impl RequestIds {
    /// Create a new sequence; the first id handed out is 1.
    pub fn new() -> Self {
        Self {
            last: AtomicU64::new(0),
        }
    }

    /// Generate the next request id.
    pub fn next_id(&self) -> u64 {
        self.last.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl Default for RequestIds {
    fn default() -> Self {
        Self::new()
    }
}
