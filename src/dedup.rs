//! Deduplication engine
//!
//! Advisory checks against the (source, source_identifier) dedup key, run
//! before any expensive work. The UNIQUE constraint in the books table is the
//! actual correctness backstop — a race between two concurrent job runs
//! touching the same item fails at insert time, never silently duplicates.

use crate::db::Database;
use crate::error::Result;
use crate::types::RawItem;
use std::sync::Arc;

/// Dedup key checks over the canonical record store
#[derive(Clone)]
pub struct DedupEngine {
    db: Arc<Database>,
}

impl DedupEngine {
    /// Create an engine over the given database
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Whether one dedup key is already persisted
    pub async fn exists(&self, source: &str, item_id: &str) -> Result<bool> {
        self.db.book_exists(source, item_id).await
    }

    /// Split a fetched page into unseen items and already-known item ids,
    /// using one bulk query per page for throughput.
    ///
    /// Order is preserved: unseen items come back in the order the fetcher
    /// yielded them.
    pub async fn partition_new(
        &self,
        source: &str,
        items: Vec<RawItem>,
    ) -> Result<(Vec<RawItem>, Vec<String>)> {
        let ids: Vec<String> = items.iter().map(|i| i.id.clone()).collect();
        let known = self.db.existing_identifiers(source, &ids).await?;

        let mut fresh = Vec::with_capacity(items.len());
        let mut duplicates = Vec::new();
        for item in items {
            if known.contains(&item.id) {
                duplicates.push(item.id);
            } else {
                fresh.push(item);
            }
        }

        Ok((fresh, duplicates))
    }
}
