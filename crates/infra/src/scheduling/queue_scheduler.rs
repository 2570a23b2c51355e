//! Periodic driver for the submission queue.
//!
//! Wakes on the configured interval and hands control to
//! [`SubmissionService::run_cycle`]. The interval is re-read from the
//! persisted configuration before every sleep, so an operator change takes
//! effect on the next cycle without a restart. Join handles are tracked,
//! cancellation is explicit, and the cycle body runs under a processing
//! timeout so a stalled exchange cannot wedge the driver.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use ekuatia_infra::scheduling::{QueueScheduler, QueueSchedulerOptions};
//!
//! # async fn example(service: Arc<ekuatia_core::SubmissionService>,
//! #                  config: Arc<dyn ekuatia_core::ConfigStore>) -> Result<(), String> {
//! let mut scheduler = QueueScheduler::new(
//!     service,
//!     config,
//!     QueueSchedulerOptions {
//!         processing_timeout: Duration::from_secs(300),
//!         ..Default::default()
//!     },
//! );
//!
//! scheduler.start().await.map_err(|e| e.to_string())?;
//! // ... application runs ...
//! scheduler.stop().await.map_err(|e| e.to_string())?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use ekuatia_core::{ConfigStore, SubmissionService};
use ekuatia_domain::constants::DEFAULT_INTERVAL_MINUTES;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::error::{SchedulerError, SchedulerResult};

/// Tuning knobs for the scheduler itself (cycle limits live in the
/// persisted `SubmissionCycleConfig`).
#[derive(Debug, Clone)]
pub struct QueueSchedulerOptions {
    /// Upper bound for one cycle, build through submit.
    pub processing_timeout: Duration,
    /// Join timeout when stopping.
    pub join_timeout: Duration,
}

impl Default for QueueSchedulerOptions {
    fn default() -> Self {
        Self { processing_timeout: Duration::from_secs(300), join_timeout: Duration::from_secs(5) }
    }
}

/// Queue scheduler with explicit lifecycle management.
pub struct QueueScheduler {
    service: Arc<SubmissionService>,
    config_store: Arc<dyn ConfigStore>,
    options: QueueSchedulerOptions,
    cancellation: CancellationToken,
    task_handle: Option<JoinHandle<()>>,
}

impl QueueScheduler {
    /// Create a new scheduler around the submission service.
    pub fn new(
        service: Arc<SubmissionService>,
        config_store: Arc<dyn ConfigStore>,
        options: QueueSchedulerOptions,
    ) -> Self {
        Self {
            service,
            config_store,
            options,
            cancellation: CancellationToken::new(),
            task_handle: None,
        }
    }

    /// Start the scheduler, spawning the background cycle task.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        info!("Starting queue scheduler");

        // Create fresh cancellation token (supports restart after stop)
        self.cancellation = CancellationToken::new();

        let service = Arc::clone(&self.service);
        let config_store = Arc::clone(&self.config_store);
        let options = self.options.clone();
        let cancel = self.cancellation.clone();

        let handle = tokio::spawn(async move {
            Self::cycle_loop(service, config_store, options, cancel).await;
        });

        self.task_handle = Some(handle);
        info!("Queue scheduler started");

        Ok(())
    }

    /// Stop the scheduler and wait for the cycle task to finish.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        info!("Stopping queue scheduler");

        self.cancellation.cancel();

        if let Some(handle) = self.task_handle.take() {
            let join_timeout = self.options.join_timeout;
            match tokio::time::timeout(join_timeout, handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!("Scheduler task panicked: {}", e);
                    return Err(SchedulerError::TaskJoinFailed(e.to_string()));
                }
                Err(_) => {
                    warn!("Scheduler task did not complete within timeout");
                    return Err(SchedulerError::Timeout { seconds: join_timeout.as_secs() });
                }
            }
        }

        info!("Queue scheduler stopped");
        self.cancellation = CancellationToken::new();

        Ok(())
    }

    /// Returns true when a scheduler instance is active.
    pub fn is_running(&self) -> bool {
        self.task_handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    /// Background cycle loop.
    async fn cycle_loop(
        service: Arc<SubmissionService>,
        config_store: Arc<dyn ConfigStore>,
        options: QueueSchedulerOptions,
        cancel: CancellationToken,
    ) {
        loop {
            let interval = Self::current_interval(&config_store).await;

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Queue scheduler loop cancelled");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    match tokio::time::timeout(options.processing_timeout, service.run_cycle()).await {
                        Ok(Ok(summary)) => {
                            if summary.attempted > 0 || summary.reconciled > 0 {
                                info!(
                                    attempted = summary.attempted,
                                    succeeded = summary.succeeded,
                                    failed = summary.failed,
                                    reconciled = summary.reconciled,
                                    "Cycle completed"
                                );
                            } else {
                                debug!(active = summary.active, "Cycle completed with no work");
                            }
                        }
                        Ok(Err(e)) => {
                            error!(error = %e, "Cycle failed");
                        }
                        Err(_) => {
                            warn!(
                                timeout_secs = options.processing_timeout.as_secs(),
                                "Cycle timed out"
                            );
                        }
                    }
                }
            }
        }
    }

    /// Interval for the next sleep, re-read so operator edits apply on the
    /// next cycle.
    async fn current_interval(config_store: &Arc<dyn ConfigStore>) -> Duration {
        let minutes = match config_store.load().await {
            Ok(config) => config.clamped().interval_minutes,
            Err(e) => {
                warn!(error = %e, "Failed to load cycle config, using default interval");
                DEFAULT_INTERVAL_MINUTES
            }
        };
        Duration::from_secs(u64::from(minutes) * 60)
    }
}

impl Drop for QueueScheduler {
    fn drop(&mut self) {
        if self.is_running() {
            warn!("QueueScheduler dropped while running; cancelling task");
            self.cancellation.cancel();
        }
    }
}
