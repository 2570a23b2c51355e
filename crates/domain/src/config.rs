//! Configuration structures
//!
//! `SubmissionCycleConfig` lives in the database and is re-read at the start
//! of every cycle; operator edits take effect on the next cycle, never
//! mid-cycle. The remaining structs describe process-level settings loaded
//! once at startup by the infra config loader.

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_INTERVAL_MINUTES, DEFAULT_MAX_DOCUMENTS_PER_CYCLE, DEFAULT_MAX_RETRIES,
};

/// Per-cycle queue configuration, snapshotted at cycle start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionCycleConfig {
    /// Whether the queue processes documents at all.
    pub active: bool,
    /// Minutes between cycles.
    pub interval_minutes: u32,
    /// Maximum documents selected per cycle.
    pub max_documents_per_cycle: u32,
    /// Attempts before a document is parked in `Error`.
    pub max_retries: u32,
}

impl SubmissionCycleConfig {
    /// Clamp operator-entered values to sane minimums.
    ///
    /// Zero intervals or batch sizes would spin the scheduler or starve the
    /// queue, so everything is floored at 1 the way the legacy system did.
    pub fn clamped(self) -> Self {
        Self {
            active: self.active,
            interval_minutes: self.interval_minutes.max(1),
            max_documents_per_cycle: self.max_documents_per_cycle.max(1),
            max_retries: self.max_retries.max(1),
        }
    }
}

impl Default for SubmissionCycleConfig {
    fn default() -> Self {
        Self {
            active: true,
            interval_minutes: DEFAULT_INTERVAL_MINUTES,
            max_documents_per_cycle: DEFAULT_MAX_DOCUMENTS_PER_CYCLE,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

/// Database settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
}

/// Transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Request timeout in seconds for authority calls.
    pub timeout_seconds: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { timeout_seconds: 30 }
    }
}

/// Top-level process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub transport: TransportConfig,
}
