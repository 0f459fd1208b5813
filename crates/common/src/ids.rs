//! Typed identifiers and the explicit per-batch context.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sequence number of a micro-batch within one stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BatchId(
    /// Raw numeric id value.
    pub u64,
);

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of the micro-batch a plan is being evaluated for.
///
/// Passed explicitly to every call that needs batch identity; there is no
/// process-wide "current batch".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchContext {
    pub batch_id: BatchId,
    /// Batch time in milliseconds since the stream's epoch.
    pub batch_time_ms: u64,
}

impl BatchContext {
    pub fn new(batch_id: u64, batch_time_ms: u64) -> Self {
        Self {
            batch_id: BatchId(batch_id),
            batch_time_ms,
        }
    }
}

impl fmt::Display for BatchContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch {} @ {}ms", self.batch_id, self.batch_time_ms)
    }
}
