//! Per-source pagination cursors.
//!
//! Cursors persist across process restarts so a paused or interrupted job
//! resumes at the next unprocessed page instead of replaying from the start.

use crate::error::DatabaseError;
use crate::{Error, Result};

use super::Database;

impl Database {
    /// Fetch the next page cursor for a source, if one is stored
    pub async fn get_fetch_cursor(&self, source: &str) -> Result<Option<u32>> {
        let page: Option<i64> =
            sqlx::query_scalar("SELECT next_page FROM fetch_cursors WHERE source = ?")
                .bind(source)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| {
                    Error::Database(DatabaseError::QueryFailed(format!(
                        "Failed to fetch cursor: {}",
                        e
                    )))
                })?;

        Ok(page.map(|p| p.max(1) as u32))
    }

    /// Store the next page cursor for a source
    pub async fn set_fetch_cursor(&self, source: &str, next_page: u32) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO fetch_cursors (source, next_page, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(source) DO UPDATE SET
                next_page = excluded.next_page,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(source)
        .bind(next_page as i64)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to set cursor: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Remove the cursor for a source so the next run starts from page 1
    pub async fn clear_fetch_cursor(&self, source: &str) -> Result<()> {
        sqlx::query("DELETE FROM fetch_cursors WHERE source = ?")
            .bind(source)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to clear cursor: {}",
                    e
                )))
            })?;

        Ok(())
    }
}
