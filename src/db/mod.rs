//! Database layer for book-ingest
//!
//! Handles SQLite persistence for canonical book records, source
//! configuration, source statistics, job results, filter decisions, and fetch
//! cursors.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] — Database lifecycle, schema migrations
//! - [`books`] — Canonical record inserts and dedup queries
//! - [`sources`] — Source configuration rows
//! - [`stats`] — Source statistics and error events
//! - [`jobs`] — Job result log
//! - [`filters`] — Filter decision audit trail
//! - [`cursors`] — Per-source pagination cursors

use crate::types::{JobResult, JobStatus, SourceReport, SourceRunStatus};
use sqlx::{FromRow, sqlite::SqlitePool};

mod books;
mod cursors;
mod filters;
mod jobs;
mod migrations;
mod sources;
mod stats;

/// New canonical book record to be inserted into the database
#[derive(Debug, Clone)]
pub struct NewBook {
    /// Normalized title
    pub title: String,
    /// Single normalized author string
    pub author: String,
    /// Four-digit publication year, if known
    pub year: Option<i32>,
    /// Language, if known
    pub language: Option<String>,
    /// Description, if known
    pub description: Option<String>,
    /// Source id (provider name)
    pub source: String,
    /// Provider-native item id — (source, source_identifier) is the dedup key
    pub source_identifier: String,
    /// Public URL of the stored asset
    pub asset_url: String,
    /// SHA-256 of the stored asset, hex encoded
    pub asset_sha256: String,
    /// Cover image URL, if one was found
    pub cover_url: Option<String>,
    /// 0–3 genre tags
    pub genres: Vec<String>,
    /// Optional sub-genre
    pub sub_genre: Option<String>,
    /// Category label
    pub category: String,
}

/// Canonical book record from the database
#[derive(Debug, Clone, FromRow)]
pub struct BookRow {
    /// Unique database ID
    pub id: i64,
    /// Normalized title
    pub title: String,
    /// Single normalized author string
    pub author: String,
    /// Four-digit publication year, if known
    pub year: Option<i64>,
    /// Language, if known
    pub language: Option<String>,
    /// Description, if known
    pub description: Option<String>,
    /// Source id (provider name)
    pub source: String,
    /// Provider-native item id
    pub source_identifier: String,
    /// Public URL of the stored asset
    pub asset_url: String,
    /// SHA-256 of the stored asset, hex encoded
    pub asset_sha256: String,
    /// Cover image URL, if one was found
    pub cover_url: Option<String>,
    /// Genre tags as a JSON array string
    pub genres: String,
    /// Optional sub-genre
    pub sub_genre: Option<String>,
    /// Category label
    pub category: String,
    /// Unix timestamp when the record was created
    pub created_at: i64,
}

impl BookRow {
    /// Decode the stored genre JSON array; malformed data yields an empty set
    pub fn genre_tags(&self) -> Vec<String> {
        serde_json::from_str(&self.genres).unwrap_or_default()
    }
}

/// Source configuration record from the database
#[derive(Debug, Clone, FromRow)]
pub struct SourceConfigRow {
    /// Source id (provider name)
    pub source: String,
    /// Whether the source participates in jobs (0 = disabled, 1 = enabled)
    pub enabled: i64,
    /// Processing priority (lower = earlier)
    pub priority: i64,
    /// Minimum delay between provider requests in milliseconds, if configured
    pub rate_limit_ms: Option<i64>,
    /// Items per fetch page, if configured
    pub batch_size: Option<i64>,
    /// Provider-specific settings blob (JSON)
    pub settings: Option<String>,
    /// Unix timestamp when the row was created
    pub created_at: i64,
    /// Unix timestamp of the last administrative update
    pub updated_at: i64,
}

impl SourceConfigRow {
    /// Whether this source is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled != 0
    }
}

/// Administrative update to a source configuration row
///
/// `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateSourceConfig {
    /// New priority
    pub priority: Option<i64>,
    /// New rate limit in milliseconds
    pub rate_limit_ms: Option<i64>,
    /// New batch size
    pub batch_size: Option<i64>,
    /// New settings blob (JSON)
    pub settings: Option<String>,
}

/// Source statistics record from the database
#[derive(Debug, Clone, FromRow)]
pub struct SourceStatsRow {
    /// Source id
    pub source: String,
    /// Cumulative items examined
    pub total_ingested: i64,
    /// Cumulative items persisted
    pub total_succeeded: i64,
    /// Cumulative items failed
    pub total_failed: i64,
    /// Unix timestamp of the last run
    pub last_run_at: Option<i64>,
    /// Outcome of the last run ("succeeded" / "partial" / "failed")
    pub last_run_status: Option<String>,
    /// Sum of per-item processing latencies in milliseconds
    pub latency_ms_total: i64,
    /// Number of latency samples
    pub latency_samples: i64,
}

impl SourceStatsRow {
    /// Average per-item processing latency in milliseconds
    pub fn avg_latency_ms(&self) -> Option<f64> {
        if self.latency_samples > 0 {
            Some(self.latency_ms_total as f64 / self.latency_samples as f64)
        } else {
            None
        }
    }

    /// Decoded last-run status
    pub fn last_run(&self) -> Option<SourceRunStatus> {
        self.last_run_status
            .as_deref()
            .map(SourceRunStatus::from_str_lossy)
    }
}

/// Outcome tallies for one per-source run, applied additively to statistics
#[derive(Debug, Clone)]
pub struct RunTally {
    /// Items examined in this run
    pub ingested: u64,
    /// Items persisted in this run
    pub succeeded: u64,
    /// Items failed in this run
    pub failed: u64,
    /// Outcome of this run
    pub status: SourceRunStatus,
    /// Sum of per-item latencies in milliseconds
    pub latency_ms_total: u64,
    /// Number of latency samples
    pub latency_samples: u64,
    /// Unix timestamp when the run finished
    pub finished_at: i64,
}

/// Job result record from the database
#[derive(Debug, Clone, FromRow)]
pub struct JobResultRow {
    /// Unique database ID
    pub id: i64,
    /// Terminal status code
    pub status: String,
    /// Unix timestamp when the job started
    pub started_at: i64,
    /// Unix timestamp when the job finished
    pub finished_at: i64,
    /// Per-source reports serialized as JSON
    pub report: String,
}

impl JobResultRow {
    /// Reconstruct the in-memory job result from this row
    pub fn into_result(self) -> crate::error::Result<JobResult> {
        use chrono::{TimeZone, Utc};

        let sources: Vec<SourceReport> = serde_json::from_str(&self.report)?;
        Ok(JobResult {
            status: JobStatus::from_str_lossy(&self.status),
            started_at: Utc
                .timestamp_opt(self.started_at, 0)
                .single()
                .unwrap_or_else(Utc::now),
            finished_at: Utc
                .timestamp_opt(self.finished_at, 0)
                .single()
                .unwrap_or_else(Utc::now),
            dry_run: false,
            sources,
        })
    }
}

/// New filter decision audit entry
#[derive(Debug, Clone)]
pub struct NewFilterDecision {
    /// Source id
    pub source: String,
    /// Provider-native item id
    pub item_id: String,
    /// Which filter rejected the item ("genre" / "author")
    pub filter: String,
    /// Rejection reason, including the offending field value
    pub reason: String,
}

/// Filter decision record from the database
#[derive(Debug, Clone, FromRow)]
pub struct FilterDecisionRow {
    /// Unique database ID
    pub id: i64,
    /// Source id
    pub source: String,
    /// Provider-native item id
    pub item_id: String,
    /// Which filter rejected the item
    pub filter: String,
    /// Rejection reason
    pub reason: String,
    /// Unix timestamp when the decision was recorded
    pub created_at: i64,
}

/// Database handle for book-ingest
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
