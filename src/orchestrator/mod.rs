//! Core orchestrator implementation split into focused submodules.
//!
//! The `Ingestor` struct and its methods are organized by domain:
//! - [`control`] - Job lifecycle control (pause/resume/stop)
//! - [`report`] - Outcome tallies and job result finalization
//! - [`job`] - Job entry point and per-source processing loop
//! - [`item`] - Per-item state machine

mod control;
mod item;
mod job;
mod report;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use control::{ControlState, JobControl};

use crate::classifier::ClassificationClient;
use crate::config::Config;
use crate::covers::CoverSearchClient;
use crate::db::Database;
use crate::dedup::DedupEngine;
use crate::error::Result;
use crate::filter::FilterEngine;
use crate::registry::SourceRegistry;
use crate::stats::{SourceHealth, derive_health, error_window};
use crate::storage::{AssetStore, FsAssetStore};
use crate::types::{Event, JobResult};
use crate::validator::ContentValidator;
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Main ingestion pipeline instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct Ingestor {
    /// Database instance for persistence (wrapped in Arc for sharing across tasks)
    /// Public for integration tests and embedding applications to query state
    pub db: Arc<Database>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Registered provider adapters
    pub(crate) registry: Arc<SourceRegistry>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
    /// Pause/stop signal shared with the running job
    pub(crate) control: JobControl,
    /// Allow/deny filter gates
    pub(crate) filter: FilterEngine,
    /// Asset download validation
    pub(crate) validator: ContentValidator,
    /// Dedup key checks
    pub(crate) dedup: DedupEngine,
    /// Object storage for validated assets (trait object for pluggable backends)
    pub(crate) store: Arc<dyn AssetStore>,
    /// External classification service client
    pub(crate) classifier: ClassificationClient,
    /// External cover-search service client
    pub(crate) covers: CoverSearchClient,
    /// Guards the one-job-at-a-time scheduling model
    pub(crate) job_active: Arc<AtomicBool>,
    /// Cleared during shutdown - no new jobs accepted
    pub(crate) accepting_new: Arc<AtomicBool>,
}

impl Ingestor {
    /// Create a new ingestor instance.
    ///
    /// Opens (or creates) the SQLite database, runs migrations, builds the
    /// service clients from configuration, and wires the event channel. The
    /// registry should already hold the provider fetchers; their
    /// configuration rows are created (disabled) on the first job run.
    pub async fn new(config: Config, registry: SourceRegistry) -> Result<Self> {
        let db = Arc::new(Database::new(&config.persistence.database_path).await?);

        // Broadcast channel with room for a full batch of per-item events
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);

        let store: Arc<dyn AssetStore> = Arc::new(FsAssetStore::new(&config.storage)?);
        let validator = ContentValidator::new(config.ingest.max_asset_bytes)?;
        let classifier = ClassificationClient::new(config.classifier.clone())?;
        let covers = CoverSearchClient::new(config.cover_search.clone())?;
        let filter = FilterEngine::new(config.filters.clone());
        let dedup = DedupEngine::new(db.clone());

        Ok(Self {
            db,
            config: Arc::new(config),
            registry: Arc::new(registry),
            event_tx,
            control: JobControl::new(),
            filter,
            validator,
            dedup,
            store,
            classifier,
            covers,
            job_active: Arc::new(AtomicBool::new(false)),
            accepting_new: Arc::new(AtomicBool::new(true)),
        })
    }

    /// Replace the object store (e.g. a bucket-backed implementation)
    pub fn with_asset_store(mut self, store: Arc<dyn AssetStore>) -> Self {
        self.store = store;
        self
    }

    /// Subscribe to ingestion events.
    ///
    /// Multiple subscribers are supported; each receives all events
    /// independently. A subscriber that falls behind by more than the channel
    /// capacity receives a `RecvError::Lagged`.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Pause the running job at the next item boundary.
    ///
    /// The in-flight item always completes or cleanly fails first. Returns
    /// true if a running job transitioned to paused.
    pub fn pause(&self) -> bool {
        let changed = self.control.pause();
        if changed {
            self.emit_event(Event::JobPaused);
        }
        changed
    }

    /// Resume a paused job at the next unprocessed item
    pub fn resume(&self) -> bool {
        let changed = self.control.resume();
        if changed {
            self.emit_event(Event::JobResumed);
        }
        changed
    }

    /// Stop the running job. Terminal: already-persisted items remain
    /// persisted, the job result is finalized with whatever was accumulated,
    /// and the job cannot be resumed.
    pub fn stop(&self) -> bool {
        let changed = self.control.stop();
        if changed {
            self.emit_event(Event::JobStopped);
        }
        changed
    }

    /// Begin graceful shutdown: refuse new jobs and stop the running one.
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("ingestor shutting down");
        self.accepting_new.store(false, Ordering::SeqCst);
        self.control.stop();
        self.emit_event(Event::Shutdown);
        Ok(())
    }

    /// Derive the current health of a source from its statistics.
    ///
    /// Re-derived at read time so elapsed time is always current; a source
    /// with no statistics yet reports `Warning`.
    pub async fn source_health(&self, source: &str) -> Result<SourceHealth> {
        let now = Utc::now();
        let cutoff = (now - error_window()).timestamp();
        let error_count_24h = self.db.source_error_count_since(source, cutoff).await?;

        let Some(stats) = self.db.get_source_stats(source).await? else {
            return Ok(SourceHealth {
                source: source.to_string(),
                status: derive_health(None, None, error_count_24h, now),
                total_ingested: 0,
                total_succeeded: 0,
                total_failed: 0,
                last_run_at: None,
                last_run_status: None,
                error_count_24h,
                avg_latency_ms: None,
            });
        };

        let last_run_at = stats
            .last_run_at
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single());
        let last_run_status = stats.last_run();

        Ok(SourceHealth {
            source: source.to_string(),
            status: derive_health(last_run_status, last_run_at, error_count_24h, now),
            total_ingested: stats.total_ingested,
            total_succeeded: stats.total_succeeded,
            total_failed: stats.total_failed,
            last_run_at,
            last_run_status,
            error_count_24h,
            avg_latency_ms: stats.avg_latency_ms(),
        })
    }

    /// List recent job results from the append-only log, newest first
    pub async fn job_history(&self, limit: i64) -> Result<Vec<JobResult>> {
        let rows = self.db.list_job_results(limit).await?;
        rows.into_iter().map(|row| row.into_result()).collect()
    }

    /// Emit an event to all subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped; the
    /// pipeline never depends on anyone listening.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }
}
