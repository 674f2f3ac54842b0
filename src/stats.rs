//! Source health derivation
//!
//! Health is a pure function of the latest statistics, re-derived at read
//! time rather than stored, so elapsed time is always current. The rules
//! apply in strict priority order:
//!
//! 1. last run failed → `Failed`
//! 2. no successful run inside the 48h window → `Warning`
//! 3. more than 5 errors inside the 24h window → `Warning`
//! 4. otherwise → `Healthy`

use crate::types::{HealthStatus, SourceRunStatus};
use chrono::{DateTime, Duration, Utc};

/// A run older than this no longer counts as a recent success
pub const STALE_SUCCESS_HOURS: i64 = 48;

/// Window for the rolling error count, in hours
pub const ERROR_WINDOW_HOURS: i64 = 24;

/// Errors tolerated inside the rolling window before health degrades
pub const ERROR_THRESHOLD: i64 = 5;

/// The stale-success window as a duration
pub fn stale_success_window() -> Duration {
    Duration::hours(STALE_SUCCESS_HOURS)
}

/// The rolling error window as a duration
pub fn error_window() -> Duration {
    Duration::hours(ERROR_WINDOW_HOURS)
}

/// Health report for one source, combining stored statistics with the
/// derived status
#[derive(Clone, Debug)]
pub struct SourceHealth {
    /// Source id
    pub source: String,
    /// Derived health status
    pub status: HealthStatus,
    /// Cumulative items examined
    pub total_ingested: i64,
    /// Cumulative items persisted
    pub total_succeeded: i64,
    /// Cumulative items failed
    pub total_failed: i64,
    /// When the last run finished
    pub last_run_at: Option<DateTime<Utc>>,
    /// Outcome of the last run
    pub last_run_status: Option<SourceRunStatus>,
    /// Errors inside the rolling 24h window
    pub error_count_24h: i64,
    /// Average per-item processing latency in milliseconds
    pub avg_latency_ms: Option<f64>,
}

/// Derive the health status for a source.
///
/// Pure function of (last run status, last run time, rolling error count) and
/// the current time, in the priority order documented at module level.
pub fn derive_health(
    last_run_status: Option<SourceRunStatus>,
    last_run_at: Option<DateTime<Utc>>,
    error_count_24h: i64,
    now: DateTime<Utc>,
) -> HealthStatus {
    if last_run_status == Some(SourceRunStatus::Failed) {
        return HealthStatus::Failed;
    }

    let has_recent_success = match (last_run_status, last_run_at) {
        (Some(_), Some(at)) => now.signed_duration_since(at) <= stale_success_window(),
        _ => false,
    };
    if !has_recent_success {
        return HealthStatus::Warning;
    }

    if error_count_24h > ERROR_THRESHOLD {
        return HealthStatus::Warning;
    }

    HealthStatus::Healthy
}
