//! Periodic job trigger
//!
//! Background scheduler that invokes the orchestrator on a fixed interval.
//! The scheduled trigger and manual [`Ingestor::run_job`] calls share the
//! same entry point and produce the same job result shape; the scheduler just
//! adds the clock.

use crate::error::Error;
use crate::orchestrator::Ingestor;
use crate::types::JobOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Periodic ingestion trigger
pub struct IngestScheduler {
    ingestor: Arc<Ingestor>,
    shutdown: CancellationToken,
}

impl IngestScheduler {
    /// Create a scheduler for the given ingestor
    pub fn new(ingestor: Arc<Ingestor>) -> Self {
        Self {
            ingestor,
            shutdown: CancellationToken::new(),
        }
    }

    /// Token that stops the scheduler loop when cancelled
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run the scheduler loop until the shutdown token fires.
    ///
    /// The first job starts immediately; subsequent jobs follow the
    /// configured interval. Returns at once if the scheduler is disabled in
    /// configuration — manual triggers still work either way.
    pub async fn run(self) {
        let config = self.ingestor.get_config();
        if !config.scheduler.enabled {
            info!("scheduler disabled in configuration");
            return;
        }

        let interval = config.scheduler.interval;
        info!(interval = ?interval, "scheduler started");

        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            match self.ingestor.run_job(JobOptions::default()).await {
                Ok(result) => {
                    info!(
                        status = result.status.as_str(),
                        processed = result.total_processed(),
                        failed = result.total_failed(),
                        "scheduled job finished"
                    );
                }
                Err(Error::JobAlreadyRunning) => {
                    warn!("previous job still running, skipping this tick");
                }
                Err(Error::ShuttingDown) => break,
                Err(e) => {
                    error!(error = %e, "scheduled job failed to run");
                }
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!("scheduler stopped");
    }
}
