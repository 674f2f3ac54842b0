//! Source configuration rows.
//!
//! Rows are created disabled the first time a fetcher registers and mutated
//! only through the explicit administrative update methods below. Jobs read
//! configuration fresh at the start of every run; nothing here is cached.

use crate::error::DatabaseError;
use crate::{Error, Result};

use super::{Database, SourceConfigRow, UpdateSourceConfig};

/// Priority assigned when a fetcher first registers (runs last until an
/// operator promotes it)
const DEFAULT_PRIORITY: i64 = 100;

impl Database {
    /// Create the configuration row for a source if it does not exist yet.
    ///
    /// New sources start disabled so registering a fetcher never silently
    /// begins ingesting.
    pub async fn ensure_source_config(&self, source: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT OR IGNORE INTO source_configs
                (source, enabled, priority, created_at, updated_at)
            VALUES (?, 0, ?, ?, ?)
            "#,
        )
        .bind(source)
        .bind(DEFAULT_PRIORITY)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to ensure source config for '{}': {}",
                source, e
            )))
        })?;

        Ok(())
    }

    /// Fetch the configuration row for a source
    pub async fn get_source_config(&self, source: &str) -> Result<Option<SourceConfigRow>> {
        let row = sqlx::query_as::<_, SourceConfigRow>(
            r#"
            SELECT source, enabled, priority, rate_limit_ms, batch_size,
                   settings, created_at, updated_at
            FROM source_configs
            WHERE source = ?
            "#,
        )
        .bind(source)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to fetch source config: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// List all source configuration rows, priority ascending then source id
    pub async fn list_source_configs(&self) -> Result<Vec<SourceConfigRow>> {
        let rows = sqlx::query_as::<_, SourceConfigRow>(
            r#"
            SELECT source, enabled, priority, rate_limit_ms, batch_size,
                   settings, created_at, updated_at
            FROM source_configs
            ORDER BY priority ASC, source ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list source configs: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Enable or disable a source (administrative operation)
    pub async fn set_source_enabled(&self, source: &str, enabled: bool) -> Result<()> {
        let result = sqlx::query(
            "UPDATE source_configs SET enabled = ?, updated_at = ? WHERE source = ?",
        )
        .bind(enabled as i64)
        .bind(chrono::Utc::now().timestamp())
        .bind(source)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to update source enabled flag: {}",
                e
            )))
        })?;

        if result.rows_affected() == 0 {
            return Err(Error::Database(DatabaseError::NotFound(format!(
                "source config '{}'",
                source
            ))));
        }

        Ok(())
    }

    /// Apply an administrative update to a source configuration row.
    ///
    /// `None` fields keep their current value.
    pub async fn update_source_config(
        &self,
        source: &str,
        update: &UpdateSourceConfig,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE source_configs SET
                priority = COALESCE(?, priority),
                rate_limit_ms = COALESCE(?, rate_limit_ms),
                batch_size = COALESCE(?, batch_size),
                settings = COALESCE(?, settings),
                updated_at = ?
            WHERE source = ?
            "#,
        )
        .bind(update.priority)
        .bind(update.rate_limit_ms)
        .bind(update.batch_size)
        .bind(&update.settings)
        .bind(chrono::Utc::now().timestamp())
        .bind(source)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to update source config: {}",
                e
            )))
        })?;

        if result.rows_affected() == 0 {
            return Err(Error::Database(DatabaseError::NotFound(format!(
                "source config '{}'",
                source
            ))));
        }

        Ok(())
    }
}
