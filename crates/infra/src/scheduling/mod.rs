//! Cycle scheduling

mod error;
mod queue_scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use queue_scheduler::{QueueScheduler, QueueSchedulerOptions};
