//! Job report accumulation.
//!
//! Tallies are structured so the result-count invariant holds by
//! construction: every `record_*` call increments `processed` together with
//! exactly one outcome counter, so `added + skipped + failed == processed`
//! can never drift.

use crate::db::RunTally;
use crate::types::{
    ItemError, JobResult, JobStatus, SourceReport, SourceRunStatus, Stage,
};
use chrono::{DateTime, Utc};

/// Per-source outcome accumulator
pub(crate) struct SourceTally {
    source: String,
    processed: u64,
    added: u64,
    skipped: u64,
    failed: u64,
    errors: Vec<ItemError>,
    max_errors: usize,
    latency_ms_total: u64,
    latency_samples: u64,
    fetch_failed: bool,
}

impl SourceTally {
    pub(crate) fn new(source: impl Into<String>, max_errors: usize) -> Self {
        Self {
            source: source.into(),
            processed: 0,
            added: 0,
            skipped: 0,
            failed: 0,
            errors: Vec::new(),
            max_errors,
            latency_ms_total: 0,
            latency_samples: 0,
            fetch_failed: false,
        }
    }

    pub(crate) fn source(&self) -> &str {
        &self.source
    }

    pub(crate) fn record_added(&mut self) {
        self.processed += 1;
        self.added += 1;
    }

    pub(crate) fn record_skipped(&mut self) {
        self.processed += 1;
        self.skipped += 1;
    }

    pub(crate) fn record_failed(&mut self, item_id: &str, stage: Stage, message: &str) {
        self.processed += 1;
        self.failed += 1;
        self.push_error(item_id, stage, message);
    }

    /// A source-level fetch failure: no item was examined, so no outcome
    /// counter moves, but the failure is reported and marks the run.
    pub(crate) fn record_fetch_failure(&mut self, page: u32, message: &str) {
        self.fetch_failed = true;
        self.push_error(&format!("page-{page}"), Stage::Fetch, message);
    }

    fn push_error(&mut self, item_id: &str, stage: Stage, message: &str) {
        // The list is bounded; counts past the bound still tally
        if self.errors.len() < self.max_errors {
            self.errors.push(ItemError {
                item_id: item_id.to_string(),
                stage,
                message: message.to_string(),
            });
        }
    }

    pub(crate) fn record_latency(&mut self, millis: u64) {
        self.latency_ms_total += millis;
        self.latency_samples += 1;
    }

    pub(crate) fn processed(&self) -> u64 {
        self.processed
    }

    pub(crate) fn added(&self) -> u64 {
        self.added
    }

    pub(crate) fn skipped(&self) -> u64 {
        self.skipped
    }

    pub(crate) fn failed(&self) -> u64 {
        self.failed
    }

    pub(crate) fn fetch_failed(&self) -> bool {
        self.fetch_failed
    }

    /// Outcome of this run for the statistics tracker
    pub(crate) fn run_status(&self) -> SourceRunStatus {
        if self.fetch_failed && self.processed == 0 {
            SourceRunStatus::Failed
        } else if self.failed > 0 || self.fetch_failed {
            SourceRunStatus::Partial
        } else {
            SourceRunStatus::Succeeded
        }
    }

    /// Additive statistics update for this run
    pub(crate) fn run_tally(&self, finished_at: DateTime<Utc>) -> RunTally {
        RunTally {
            ingested: self.processed,
            succeeded: self.added,
            failed: self.failed,
            status: self.run_status(),
            latency_ms_total: self.latency_ms_total,
            latency_samples: self.latency_samples,
            finished_at: finished_at.timestamp(),
        }
    }

    pub(crate) fn into_report(self) -> SourceReport {
        SourceReport {
            source: self.source,
            processed: self.processed,
            added: self.added,
            skipped: self.skipped,
            failed: self.failed,
            errors: self.errors,
        }
    }
}

/// Whole-job accumulator
pub(crate) struct JobReport {
    started_at: DateTime<Utc>,
    tallies: Vec<SourceTally>,
}

impl JobReport {
    pub(crate) fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            tallies: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, tally: SourceTally) {
        self.tallies.push(tally);
    }

    /// Finalize into an immutable job result.
    ///
    /// Status: `failed` only when a source-level fetch failure occurred and no
    /// item anywhere could be processed; `completed` for zero failures of any
    /// kind; otherwise `partial`.
    pub(crate) fn finalize(self, finished_at: DateTime<Utc>, dry_run: bool) -> JobResult {
        let any_fetch_failed = self.tallies.iter().any(|t| t.fetch_failed);
        let total_processed: u64 = self.tallies.iter().map(|t| t.processed).sum();
        let total_failed: u64 = self.tallies.iter().map(|t| t.failed).sum();

        let status = if any_fetch_failed && total_processed == 0 {
            JobStatus::Failed
        } else if total_failed == 0 && !any_fetch_failed {
            JobStatus::Completed
        } else {
            JobStatus::Partial
        };

        JobResult {
            status,
            started_at: self.started_at,
            finished_at,
            dry_run,
            sources: self.tallies.into_iter().map(SourceTally::into_report).collect(),
        }
    }
}
