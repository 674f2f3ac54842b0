//! Job entry point and per-source processing loop.
//!
//! A job walks the enabled sources in priority order, pulls one page of
//! candidate items per source, and drives every item through the pipeline
//! state machine. A single item failure never aborts the batch; a
//! source-level fetch failure never prevents later sources from running.

use super::Ingestor;
use super::control::Checkpoint;
use super::report::{JobReport, SourceTally};
use crate::db::SourceConfigRow;
use crate::error::{Error, FailureClass, Result};
use crate::fetcher::BookFetcher;
use crate::retry::with_retry;
use crate::types::{Event, FetchOptions, JobOptions, JobResult, RawItem};
use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

/// Minimum inter-request delay enforcer for one provider
pub(crate) struct RateGate {
    min_interval: Duration,
    last_request: Option<Instant>,
}

impl RateGate {
    pub(crate) fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: None,
        }
    }

    /// Wait out the remainder of the interval since the previous request,
    /// then claim the current slot.
    pub(crate) async fn wait(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        self.last_request = Some(Instant::now());
    }
}

impl Ingestor {
    /// Run one ingestion job across the enabled sources.
    ///
    /// Both the scheduled trigger and manual invocations land here. Returns
    /// the finalized job result; `Err` is reserved for refusing to start
    /// (shutdown, concurrent job) and for a failing registry resolution.
    pub async fn run_job(&self, options: JobOptions) -> Result<JobResult> {
        if !self.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }
        if self
            .job_active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::JobAlreadyRunning);
        }

        let result = self.run_job_inner(&options).await;
        self.job_active.store(false, Ordering::SeqCst);
        result
    }

    async fn run_job_inner(&self, options: &JobOptions) -> Result<JobResult> {
        self.control.reset();

        let started_at = Utc::now();
        tracing::info!(dry_run = options.dry_run, "job started");
        self.emit_event(Event::JobStarted {
            dry_run: options.dry_run,
        });

        // Configuration is read fresh per invocation - no process-wide cache
        let sources = self.registry.enabled_sources(&self.db).await?;
        let mut report = JobReport::new(started_at);

        for (fetcher, config_row) in sources {
            if self.control.checkpoint().await == Checkpoint::Stop {
                break;
            }

            let (tally, stopped) = self
                .process_source(fetcher, &config_row, options)
                .await;
            report.push(tally);

            if stopped {
                break;
            }
        }

        let result = report.finalize(Utc::now(), options.dry_run);

        // A dry run leaves zero observable side effects, including the log
        if !options.dry_run {
            if let Err(e) = self.db.insert_job_result(&result).await {
                tracing::error!(error = %e, "failed to log job result");
            }
        }

        tracing::info!(
            status = result.status.as_str(),
            processed = result.total_processed(),
            failed = result.total_failed(),
            "job finished"
        );
        self.emit_event(Event::JobCompleted {
            status: result.status,
        });

        Ok(result)
    }

    /// Process one page of one source. Returns the tally and whether a stop
    /// signal interrupted the loop.
    async fn process_source(
        &self,
        fetcher: Arc<dyn BookFetcher>,
        config_row: &SourceConfigRow,
        options: &JobOptions,
    ) -> (SourceTally, bool) {
        let source = fetcher.source_id().to_string();
        let mut tally = SourceTally::new(&source, self.config.ingest.max_errors_per_source);

        tracing::info!(source = %source, "processing source");
        self.emit_event(Event::SourceStarted {
            source: source.clone(),
        });

        let metadata = match fetcher.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                // Validated at registration, so this is a genuinely broken adapter
                tally.record_fetch_failure(0, &format!("metadata call failed: {e}"));
                self.finish_source(&tally, options.dry_run).await;
                return (tally, false);
            }
        };

        // Resolution order: job override, source configuration, fetcher default
        let batch_size = options
            .batch_size
            .or(config_row.batch_size.map(|b| b.max(1) as usize))
            .unwrap_or(metadata.default_batch_size);
        let rate_limit = config_row
            .rate_limit_ms
            .map(|ms| Duration::from_millis(ms.max(0) as u64))
            .unwrap_or(metadata.default_rate_limit);
        let mut gate = RateGate::new(rate_limit);

        // Resume from the persisted cursor; first run starts at page 1
        let page = match self.db.get_fetch_cursor(&source).await {
            Ok(cursor) => cursor.unwrap_or(1),
            Err(e) => {
                tracing::warn!(source = %source, error = %e, "cursor read failed, starting at page 1");
                1
            }
        };

        let fetch_options = FetchOptions {
            batch_size,
            page,
            language: options
                .language
                .clone()
                .or_else(|| self.config.ingest.language.clone()),
        };

        gate.wait().await;
        let items = match self
            .with_provider_retry(|| fetcher.fetch_items(&fetch_options))
            .await
        {
            Ok(items) => items,
            Err(e) => {
                tracing::error!(source = %source, page, error = %e, "fetch failed");
                tally.record_fetch_failure(page, &e.to_string());
                if !options.dry_run {
                    self.note_source_error(&source, &e.to_string()).await;
                }
                self.finish_source(&tally, options.dry_run).await;
                return (tally, false);
            }
        };

        if items.is_empty() {
            tracing::debug!(source = %source, page, "no items on page, catalog exhausted");
            // Next scheduled run re-walks from the start; known items skip out
            if !options.dry_run {
                if let Err(e) = self.db.clear_fetch_cursor(&source).await {
                    tracing::warn!(source = %source, error = %e, "cursor clear failed");
                }
            }
            self.finish_source(&tally, options.dry_run).await;
            return (tally, false);
        }

        let stopped = self
            .process_page(&fetcher, &source, items, &mut tally, &mut gate, options)
            .await;

        // Advance only when the page completed; a stopped page replays and
        // dedup skips whatever already landed
        if !stopped && !options.dry_run {
            if let Err(e) = self.db.set_fetch_cursor(&source, page + 1).await {
                tracing::warn!(source = %source, error = %e, "cursor advance failed");
            }
        }

        self.finish_source(&tally, options.dry_run).await;
        (tally, stopped)
    }

    /// Drive every item of a fetched page through the pipeline. Returns true
    /// if a stop signal interrupted the loop.
    async fn process_page(
        &self,
        fetcher: &Arc<dyn BookFetcher>,
        source: &str,
        items: Vec<RawItem>,
        tally: &mut SourceTally,
        gate: &mut RateGate,
        options: &JobOptions,
    ) -> bool {
        let (fresh, duplicates) = match self.dedup.partition_new(source, items).await {
            Ok(split) => split,
            Err(e) => {
                tracing::error!(source = %source, error = %e, "dedup check failed");
                tally.record_fetch_failure(0, &format!("dedup check failed: {e}"));
                return false;
            }
        };

        for item_id in duplicates {
            tally.record_skipped();
            self.emit_event(Event::ItemSkipped {
                source: source.to_string(),
                item_id,
                reason: "duplicate".to_string(),
            });
        }

        for item in fresh {
            // Pause/stop take effect here, never mid-item
            if self.control.checkpoint().await == Checkpoint::Stop {
                tracing::info!(source = %source, "stop signal received, finalizing");
                return true;
            }

            let item_started = Instant::now();
            let outcome = self.process_item(fetcher, source, &item, gate, options).await;
            tally.record_latency(item_started.elapsed().as_millis() as u64);

            match outcome {
                super::item::ItemOutcome::Added { title } => {
                    tally.record_added();
                    self.emit_event(Event::ItemPersisted {
                        source: source.to_string(),
                        item_id: item.id.clone(),
                        title,
                    });
                }
                super::item::ItemOutcome::Skipped { reason } => {
                    tally.record_skipped();
                    self.emit_event(Event::ItemSkipped {
                        source: source.to_string(),
                        item_id: item.id.clone(),
                        reason,
                    });
                }
                super::item::ItemOutcome::Failed { stage, message } => {
                    tracing::warn!(
                        source = %source,
                        item_id = %item.id,
                        stage = ?stage,
                        error = %message,
                        "item failed"
                    );
                    tally.record_failed(&item.id, stage, &message);
                    if !options.dry_run {
                        self.note_source_error(source, &message).await;
                    }
                    self.emit_event(Event::ItemFailed {
                        source: source.to_string(),
                        item_id: item.id.clone(),
                        stage,
                        error: message,
                    });
                }
            }
        }

        false
    }

    /// Apply the run tally to source statistics and announce completion.
    async fn finish_source(&self, tally: &SourceTally, dry_run: bool) {
        if !dry_run {
            let run = tally.run_tally(Utc::now());
            if let Err(e) = self.db.apply_run_tally(tally.source(), &run).await {
                tracing::error!(source = tally.source(), error = %e, "failed to update source statistics");
            }
        }

        self.emit_event(Event::SourceCompleted {
            source: tally.source().to_string(),
            processed: tally.processed(),
            added: tally.added(),
            skipped: tally.skipped(),
            failed: tally.failed(),
        });
    }

    async fn note_source_error(&self, source: &str, message: &str) {
        if let Err(e) = self
            .db
            .record_source_error(source, message, Utc::now().timestamp())
            .await
        {
            tracing::warn!(source = %source, error = %e, "failed to record error event");
        }
    }

    /// Provider-call retry policy: transport failures back off through the
    /// transport config; an explicit rate-limit signal waits the provider's
    /// advertised period and retries exactly once.
    pub(crate) async fn with_provider_retry<T, F, Fut>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        match with_retry(&self.config.retry.transport, &mut operation).await {
            Err(Error::RateLimited {
                source_id,
                retry_after,
            }) => {
                tracing::warn!(
                    source = %source_id,
                    wait = ?retry_after,
                    "provider rate limit, honoring advertised wait"
                );
                tokio::time::sleep(retry_after).await;
                operation().await
            }
            other => other,
        }
    }

    /// Predicate for the bounded persistence retry policy
    pub(crate) fn is_persistence_error(error: &Error) -> bool {
        error.class() == FailureClass::Persistence
    }
}
