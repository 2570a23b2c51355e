//! Queue run bookkeeping types

use serde::{Deserialize, Serialize};

/// One record per scheduler cycle, including zero-work and inactive cycles.
///
/// These rows feed the operator monitor; nothing in the pipeline reads them
/// back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueRunRecord {
    /// UUIDv7 primary key.
    pub id: String,
    pub started_at: i64,
    pub finished_at: Option<i64>,
    /// Documents selected and driven through the pipeline this cycle.
    pub attempted: u32,
    /// Documents that ended the cycle accepted or submitted.
    pub succeeded: u32,
    /// Documents that failed an attempt this cycle (retryable or terminal).
    pub failed: u32,
}

impl QueueRunRecord {
    /// Start a new run record at the given timestamp.
    pub fn started(id: String, started_at: i64) -> Self {
        Self { id, started_at, finished_at: None, attempted: 0, succeeded: 0, failed: 0 }
    }
}
