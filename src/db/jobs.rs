//! Job result log (append-only).

use crate::error::DatabaseError;
use crate::types::JobResult;
use crate::{Error, Result};

use super::{Database, JobResultRow};

impl Database {
    /// Append one job result to the log
    pub async fn insert_job_result(&self, result: &JobResult) -> Result<i64> {
        let report = serde_json::to_string(&result.sources)?;

        let row = sqlx::query(
            "INSERT INTO job_results (status, started_at, finished_at, report) VALUES (?, ?, ?, ?)",
        )
        .bind(result.status.as_str())
        .bind(result.started_at.timestamp())
        .bind(result.finished_at.timestamp())
        .bind(report)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert job result: {}",
                e
            )))
        })?;

        Ok(row.last_insert_rowid())
    }

    /// List the most recent job results, newest first
    pub async fn list_job_results(&self, limit: i64) -> Result<Vec<JobResultRow>> {
        let rows = sqlx::query_as::<_, JobResultRow>(
            r#"
            SELECT id, status, started_at, finished_at, report
            FROM job_results
            ORDER BY started_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list job results: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Total number of logged job results
    pub async fn count_job_results(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM job_results")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to count job results: {}",
                    e
                )))
            })?;

        Ok(count)
    }
}
