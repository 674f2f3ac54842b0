//! Per-item state machine.
//!
//! discovered → classified → filtered(pass|reject) → validated(pass|fail) →
//! persisted | skipped | failed. Every stage converts its own failures into a
//! structured outcome; nothing thrown here can abort the batch.

use super::Ingestor;
use super::job::RateGate;
use crate::db::{NewBook, NewFilterDecision};
use crate::error::FailureClass;
use crate::fetcher::BookFetcher;
use crate::filter::FilterVerdict;
use crate::mapper::normalize;
use crate::retry::with_retry_when;
use crate::types::{Classification, Event, JobOptions, RawItem, Stage};
use crate::validator::sanitize_filename;
use std::sync::Arc;

/// Terminal outcome of one item's trip through the pipeline
pub(crate) enum ItemOutcome {
    /// Persisted (or, in a dry run, cleared every gate and would have been)
    Added {
        /// Normalized title, for the event stream
        title: String,
    },
    /// Expected non-ingestion: duplicate or filter rejection
    Skipped {
        /// Why the item was skipped
        reason: String,
    },
    /// The item failed at a stage; the batch continues without it
    Failed {
        /// Stage at which it failed
        stage: Stage,
        /// Error message
        message: String,
    },
}

impl Ingestor {
    /// Drive one item through classify → filter → validate → store → persist.
    pub(crate) async fn process_item(
        &self,
        fetcher: &Arc<dyn BookFetcher>,
        source: &str,
        item: &RawItem,
        gate: &mut RateGate,
        options: &JobOptions,
    ) -> ItemOutcome {
        let fields = normalize(item, source);
        let format = self.config.ingest.preferred_format;

        // Classification is untrusted and best-effort: failure degrades to
        // the uncategorized fallback instead of failing the item
        let classification = match self.classifier.classify(&fields).await {
            Ok(classification) => classification,
            Err(e) => {
                tracing::warn!(
                    source = %source,
                    item_id = %item.id,
                    error = %e,
                    "classification failed, proceeding uncategorized"
                );
                Classification::uncategorized()
            }
        };

        if let FilterVerdict::Reject { filter, reason } =
            self.filter.evaluate(&fields.author, &classification.genres)
        {
            if !options.dry_run {
                let decision = NewFilterDecision {
                    source: source.to_string(),
                    item_id: item.id.clone(),
                    filter: filter.to_string(),
                    reason: reason.clone(),
                };
                if let Err(e) = self.db.insert_filter_decision(&decision).await {
                    tracing::warn!(error = %e, "failed to record filter decision");
                }
            }
            return ItemOutcome::Skipped {
                reason: format!("{filter} filter: {reason}"),
            };
        }

        let asset_url = match self
            .with_provider_retry(|| fetcher.resolve_asset_url(&item.id, format))
            .await
        {
            Ok(Some(url)) => url,
            Ok(None) => {
                return ItemOutcome::Failed {
                    stage: Stage::Validate,
                    message: format!("no {} asset available", format.extension()),
                };
            }
            Err(e) => {
                return ItemOutcome::Failed {
                    stage: Stage::Validate,
                    message: format!("asset URL resolution failed: {e}"),
                };
            }
        };

        gate.wait().await;
        let asset = match self
            .with_provider_retry(|| self.validator.fetch_validated(source, &asset_url, format))
            .await
        {
            Ok(asset) => asset,
            Err(e) => {
                return ItemOutcome::Failed {
                    stage: Stage::Validate,
                    message: e.to_string(),
                };
            }
        };

        // Dry run: the full decision pipeline ran; stop before any write
        if options.dry_run {
            return ItemOutcome::Added {
                title: fields.title,
            };
        }

        // Deterministic path from (source, sanitized item id) keeps the
        // pre-check consistent with the dedup check
        let path = format!(
            "{}/{}.{}",
            source,
            sanitize_filename(&item.id),
            format.extension()
        );

        match self.store.exists(&path).await {
            Ok(false) => {}
            Ok(true) => {
                return ItemOutcome::Failed {
                    stage: Stage::Store,
                    message: format!("storage path '{path}' already occupied (dedup miss)"),
                };
            }
            Err(e) => {
                return ItemOutcome::Failed {
                    stage: Stage::Store,
                    message: e.to_string(),
                };
            }
        }

        let public_url = match with_retry_when(
            &self.config.retry.persistence,
            || self.store.upload(&asset.bytes, &path),
            Self::is_persistence_error,
        )
        .await
        {
            Ok(url) => url,
            Err(e) => {
                return ItemOutcome::Failed {
                    stage: Stage::Store,
                    message: e.to_string(),
                };
            }
        };

        // Cover art never blocks ingestion; exhaustion becomes a named
        // notification and the record proceeds without a cover
        let cover_url = match self
            .covers
            .lookup(&fields.title, &fields.author, None)
            .await
        {
            Ok(cover) => cover.url,
            Err(e) => {
                self.emit_event(Event::CoverSearchFailed {
                    source: source.to_string(),
                    item_id: item.id.clone(),
                    error: e.to_string(),
                });
                None
            }
        };

        let book = NewBook {
            title: fields.title.clone(),
            author: fields.author,
            year: fields.year,
            language: fields.language,
            description: fields.description,
            source: source.to_string(),
            source_identifier: item.id.clone(),
            asset_url: public_url,
            asset_sha256: asset.sha256,
            cover_url,
            genres: classification.genres,
            sub_genre: classification.sub_genre,
            category: classification.category,
        };

        match with_retry_when(
            &self.config.retry.persistence,
            || self.db.insert_book(&book),
            Self::is_persistence_error,
        )
        .await
        {
            Ok(_) => ItemOutcome::Added {
                title: fields.title,
            },
            Err(e) if e.class() == FailureClass::Duplicate => {
                // A concurrent run won the insert race; the constraint did its job
                ItemOutcome::Skipped {
                    reason: "duplicate (lost insert race)".to_string(),
                }
            }
            Err(e) => ItemOutcome::Failed {
                stage: Stage::Persist,
                message: e.to_string(),
            },
        }
    }
}
