//! Canonical record inserts and dedup queries.

use crate::error::DatabaseError;
use crate::{Error, Result};
use std::collections::HashSet;

use super::{BookRow, Database, NewBook};

/// SQLite limits bound parameters per statement; dedup lookups chunk at this size.
const IN_CLAUSE_CHUNK: usize = 500;

impl Database {
    /// Insert a canonical book record.
    ///
    /// The UNIQUE(source, source_identifier) constraint is the dedup backstop:
    /// a concurrent insert of the same item surfaces here as
    /// [`DatabaseError::ConstraintViolation`] rather than silently duplicating.
    pub async fn insert_book(&self, book: &NewBook) -> Result<i64> {
        let genres = serde_json::to_string(&book.genres)?;

        let result = sqlx::query(
            r#"
            INSERT INTO books (
                title, author, year, language, description,
                source, source_identifier, asset_url, asset_sha256,
                cover_url, genres, sub_genre, category, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.year)
        .bind(&book.language)
        .bind(&book.description)
        .bind(&book.source)
        .bind(&book.source_identifier)
        .bind(&book.asset_url)
        .bind(&book.asset_sha256)
        .bind(&book.cover_url)
        .bind(genres)
        .bind(&book.sub_genre)
        .bind(&book.category)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if e.as_database_error()
                .is_some_and(|d| d.is_unique_violation())
            {
                Error::Database(DatabaseError::ConstraintViolation(format!(
                    "dedup key ({}, {}) already exists",
                    book.source, book.source_identifier
                )))
            } else {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to insert book: {}",
                    e
                )))
            }
        })?;

        Ok(result.last_insert_rowid())
    }

    /// Check whether a dedup key is already persisted
    pub async fn book_exists(&self, source: &str, source_identifier: &str) -> Result<bool> {
        let exists: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM books WHERE source = ? AND source_identifier = ?)",
        )
        .bind(source)
        .bind(source_identifier)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to check book existence: {}",
                e
            )))
        })?;

        Ok(exists != 0)
    }

    /// Return which of the given identifiers are already persisted for a source
    pub async fn existing_identifiers(
        &self,
        source: &str,
        identifiers: &[String],
    ) -> Result<HashSet<String>> {
        let mut known = HashSet::new();

        for chunk in identifiers.chunks(IN_CLAUSE_CHUNK) {
            let placeholders = vec!["?"; chunk.len()].join(", ");
            let sql = format!(
                "SELECT source_identifier FROM books WHERE source = ? AND source_identifier IN ({})",
                placeholders
            );

            let mut query = sqlx::query_scalar::<_, String>(&sql).bind(source);
            for id in chunk {
                query = query.bind(id);
            }

            let rows = query.fetch_all(&self.pool).await.map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to query existing identifiers: {}",
                    e
                )))
            })?;

            known.extend(rows);
        }

        Ok(known)
    }

    /// Fetch one book by its dedup key
    pub async fn get_book(
        &self,
        source: &str,
        source_identifier: &str,
    ) -> Result<Option<BookRow>> {
        let row = sqlx::query_as::<_, BookRow>(
            r#"
            SELECT
                id, title, author, year, language, description,
                source, source_identifier, asset_url, asset_sha256,
                cover_url, genres, sub_genre, category, created_at
            FROM books
            WHERE source = ? AND source_identifier = ?
            LIMIT 1
            "#,
        )
        .bind(source)
        .bind(source_identifier)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to fetch book: {}",
                e
            )))
        })?;

        Ok(row)
    }

    /// Total number of persisted book records
    pub async fn count_books(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM books")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                Error::Database(DatabaseError::QueryFailed(format!(
                    "Failed to count books: {}",
                    e
                )))
            })?;

        Ok(count)
    }

    /// List the most recently persisted books
    pub async fn list_books(&self, limit: i64) -> Result<Vec<BookRow>> {
        let rows = sqlx::query_as::<_, BookRow>(
            r#"
            SELECT
                id, title, author, year, language, description,
                source, source_identifier, asset_url, asset_sha256,
                cover_url, genres, sub_genre, category, created_at
            FROM books
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list books: {}",
                e
            )))
        })?;

        Ok(rows)
    }
}
