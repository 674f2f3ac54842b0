//! Source statistics and error events.

use crate::error::DatabaseError;
use crate::{Error, Result};

use super::{Database, RunTally, SourceStatsRow};

impl Database {
    /// Apply one run's outcome tallies to a source's cumulative statistics.
    ///
    /// Totals are incremented, never overwritten; only the last-run fields are
    /// replaced.
    pub async fn apply_run_tally(&self, source: &str, tally: &RunTally) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO source_stats (
                source, total_ingested, total_succeeded, total_failed,
                last_run_at, last_run_status, latency_ms_total, latency_samples
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(source) DO UPDATE SET
                total_ingested = total_ingested + excluded.total_ingested,
                total_succeeded = total_succeeded + excluded.total_succeeded,
                total_failed = total_failed + excluded.total_failed,
                last_run_at = excluded.last_run_at,
                last_run_status = excluded.last_run_status,
                latency_ms_total = latency_ms_total + excluded.latency_ms_total,
                latency_samples = latency_samples + excluded.latency_samples
            "#,
        )
        .bind(source)
        .bind(tally.ingested as i64)
        .bind(tally.succeeded as i64)
        .bind(tally.failed as i64)
        .bind(tally.finished_at)
        .bind(tally.status.as_str())
        .bind(tally.latency_ms_total as i64)
        .bind(tally.latency_samples as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to apply run tally: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Fetch the cumulative statistics row for a source
    pub async fn get_source_stats(&self, source: &str) -> Result<Option<SourceStatsRow>> {
        let row = sqlx::query_as::<_, SourceStatsRow>(
            r#"
            SELECT source, total_ingested, total_succeeded, total_failed,
                   last_run_at, last_run_status, latency_ms_total, latency_samples
            FROM source_stats
            WHERE source = ?
            "#,
        )
        .bind(source)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to fetch source stats: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// Record one error event for a source
    pub async fn record_source_error(
        &self,
        source: &str,
        message: &str,
        occurred_at: i64,
    ) -> Result<()> {
        sqlx::query("INSERT INTO source_errors (source, occurred_at, message) VALUES (?, ?, ?)")
            .bind(source)
            .bind(occurred_at)
            .bind(message)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to record source error: {}",
                    e
                )))
            })?;

        Ok(())
    }

    /// Count error events for a source at or after a cutoff timestamp.
    ///
    /// The rolling 24-hour error count is this query with `cutoff = now - 24h`,
    /// so elapsed time is always current at read time.
    pub async fn source_error_count_since(&self, source: &str, cutoff: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM source_errors WHERE source = ? AND occurred_at >= ?",
        )
        .bind(source)
        .bind(cutoff)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to count source errors: {}",
                e
            )))
        })?;

        Ok(count)
    }
}
