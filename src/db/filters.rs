//! Filter decision audit trail (write-only).
//!
//! Decisions are recorded for operator review and never read back into the
//! pipeline's own logic.

use crate::error::DatabaseError;
use crate::{Error, Result};

use super::{Database, FilterDecisionRow, NewFilterDecision};

impl Database {
    /// Record one filter rejection
    pub async fn insert_filter_decision(&self, decision: &NewFilterDecision) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO filter_decisions (source, item_id, filter, reason, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&decision.source)
        .bind(&decision.item_id)
        .bind(&decision.filter)
        .bind(&decision.reason)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to insert filter decision: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// List recent filter decisions, optionally restricted to one source
    pub async fn list_filter_decisions(
        &self,
        source: Option<&str>,
        limit: i64,
    ) -> Result<Vec<FilterDecisionRow>> {
        let rows = match source {
            Some(source) => {
                sqlx::query_as::<_, FilterDecisionRow>(
                    r#"
                    SELECT id, source, item_id, filter, reason, created_at
                    FROM filter_decisions
                    WHERE source = ?
                    ORDER BY id DESC
                    LIMIT ?
                    "#,
                )
                .bind(source)
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, FilterDecisionRow>(
                    r#"
                    SELECT id, source, item_id, filter, reason, created_at
                    FROM filter_decisions
                    ORDER BY id DESC
                    LIMIT ?
                    "#,
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list filter decisions: {}",
                e
            )))
        })?;

        Ok(rows)
    }

    /// Total number of recorded filter decisions
    pub async fn count_filter_decisions(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM filter_decisions")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to count filter decisions: {}",
                    e
                )))
            })?;

        Ok(count)
    }
}
