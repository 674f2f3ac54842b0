//! Source registry
//!
//! Holds the registered provider adapters and decides, fresh at the start of
//! every job, which of them run and in what order. Registration validates the
//! fetcher contract; a misbehaving fetcher is excluded and logged without
//! affecting the others.

use crate::db::{Database, SourceConfigRow};
use crate::error::{Error, Result};
use crate::fetcher::BookFetcher;
use std::sync::Arc;

/// Registry of provider adapters
#[derive(Default)]
pub struct SourceRegistry {
    fetchers: Vec<Arc<dyn BookFetcher>>,
}

impl SourceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fetcher after validating its contract.
    ///
    /// Returns `true` when the fetcher was accepted. A fetcher with an
    /// invalid source id, a failing or nonsensical `metadata()`, or a source
    /// id that is already taken is rejected and logged; other fetchers are
    /// unaffected.
    pub fn register(&mut self, fetcher: Arc<dyn BookFetcher>) -> bool {
        match self.validate(fetcher.as_ref()) {
            Ok(()) => {
                tracing::info!(source = fetcher.source_id(), "registered fetcher");
                self.fetchers.push(fetcher);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "excluding fetcher from registry");
                false
            }
        }
    }

    fn validate(&self, fetcher: &dyn BookFetcher) -> Result<()> {
        let source_id = fetcher.source_id();

        if source_id.is_empty() {
            return Err(Error::InvalidFetcher {
                source_id: String::new(),
                reason: "empty source id".to_string(),
            });
        }

        if !source_id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
        {
            return Err(Error::InvalidFetcher {
                source_id: source_id.to_string(),
                reason: "source id must be lowercase alphanumeric, hyphen, or underscore"
                    .to_string(),
            });
        }

        if self.fetchers.iter().any(|f| f.source_id() == source_id) {
            return Err(Error::InvalidFetcher {
                source_id: source_id.to_string(),
                reason: "source id already registered".to_string(),
            });
        }

        let metadata = fetcher.metadata().map_err(|e| Error::InvalidFetcher {
            source_id: source_id.to_string(),
            reason: format!("metadata call failed: {e}"),
        })?;

        if metadata.display_name.trim().is_empty() {
            return Err(Error::InvalidFetcher {
                source_id: source_id.to_string(),
                reason: "empty display name".to_string(),
            });
        }
        if metadata.default_batch_size == 0 {
            return Err(Error::InvalidFetcher {
                source_id: source_id.to_string(),
                reason: "default batch size must be non-zero".to_string(),
            });
        }
        if metadata.supported_formats.is_empty() {
            return Err(Error::InvalidFetcher {
                source_id: source_id.to_string(),
                reason: "no supported formats".to_string(),
            });
        }

        Ok(())
    }

    /// Number of registered fetchers
    pub fn len(&self) -> usize {
        self.fetchers.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.fetchers.is_empty()
    }

    /// Look up a registered fetcher by source id
    pub fn get(&self, source_id: &str) -> Option<Arc<dyn BookFetcher>> {
        self.fetchers
            .iter()
            .find(|f| f.source_id() == source_id)
            .cloned()
    }

    /// Resolve the enabled fetchers in processing order, reading configuration
    /// fresh from the database.
    ///
    /// Configuration rows are created (disabled) for any fetcher seen for the
    /// first time. Disabled sources are excluded regardless of priority;
    /// order is priority ascending, ties broken alphabetically by source id.
    pub async fn enabled_sources(
        &self,
        db: &Database,
    ) -> Result<Vec<(Arc<dyn BookFetcher>, SourceConfigRow)>> {
        let mut enabled = Vec::new();

        for fetcher in &self.fetchers {
            let source_id = fetcher.source_id();
            db.ensure_source_config(source_id).await?;

            let Some(config) = db.get_source_config(source_id).await? else {
                // ensure just inserted it; missing row means concurrent deletion
                tracing::warn!(source = source_id, "source config vanished, skipping");
                continue;
            };

            if config.is_enabled() {
                enabled.push((fetcher.clone(), config));
            } else {
                tracing::debug!(source = source_id, "source disabled, skipping");
            }
        }

        enabled.sort_by(|(a, ca), (b, cb)| {
            ca.priority
                .cmp(&cb.priority)
                .then_with(|| a.source_id().cmp(b.source_id()))
        });

        Ok(enabled)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AssetFormat, FetchOptions, FetcherMetadata, RawItem};
    use async_trait::async_trait;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    /// Minimal fetcher whose contract surface is fully scriptable
    struct StubFetcher {
        id: &'static str,
        metadata: Result<FetcherMetadata>,
    }

    impl StubFetcher {
        fn valid(id: &'static str) -> Arc<Self> {
            Arc::new(Self {
                id,
                metadata: Ok(FetcherMetadata {
                    display_name: "Stub".to_string(),
                    default_rate_limit: Duration::from_millis(10),
                    default_batch_size: 5,
                    supported_formats: vec![AssetFormat::Pdf],
                }),
            })
        }
    }

    #[async_trait]
    impl BookFetcher for StubFetcher {
        fn source_id(&self) -> &str {
            self.id
        }

        fn metadata(&self) -> Result<FetcherMetadata> {
            match &self.metadata {
                Ok(m) => Ok(m.clone()),
                Err(_) => Err(Error::Other("metadata failed".to_string())),
            }
        }

        async fn fetch_items(&self, _options: &FetchOptions) -> Result<Vec<RawItem>> {
            Ok(Vec::new())
        }

        async fn resolve_asset_url(
            &self,
            _item_id: &str,
            _format: AssetFormat,
        ) -> Result<Option<String>> {
            Ok(None)
        }
    }

    #[test]
    fn valid_fetcher_registers() {
        let mut registry = SourceRegistry::new();
        assert!(registry.register(StubFetcher::valid("archive")));
        assert_eq!(registry.len(), 1);
        assert!(registry.get("archive").is_some());
    }

    #[test]
    fn empty_source_id_is_rejected() {
        let mut registry = SourceRegistry::new();
        assert!(!registry.register(StubFetcher::valid("")));
        assert!(registry.is_empty());
    }

    #[test]
    fn malformed_source_id_is_rejected() {
        let mut registry = SourceRegistry::new();
        assert!(!registry.register(StubFetcher::valid("Bad Source!")));
        assert!(registry.is_empty());
    }

    #[test]
    fn duplicate_source_id_is_rejected() {
        let mut registry = SourceRegistry::new();
        assert!(registry.register(StubFetcher::valid("archive")));
        assert!(!registry.register(StubFetcher::valid("archive")));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn failing_metadata_excludes_only_that_fetcher() {
        let mut registry = SourceRegistry::new();

        let broken = Arc::new(StubFetcher {
            id: "broken",
            metadata: Err(Error::Other("boom".to_string())),
        });

        assert!(!registry.register(broken));
        assert!(
            registry.register(StubFetcher::valid("healthy")),
            "one failing fetcher must not affect others"
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn zero_batch_size_metadata_is_rejected() {
        let mut registry = SourceRegistry::new();
        let fetcher = Arc::new(StubFetcher {
            id: "zero",
            metadata: Ok(FetcherMetadata {
                display_name: "Zero".to_string(),
                default_rate_limit: Duration::from_millis(10),
                default_batch_size: 0,
                supported_formats: vec![AssetFormat::Pdf],
            }),
        });
        assert!(!registry.register(fetcher));
    }

    #[tokio::test]
    async fn enabled_sources_orders_by_priority_then_id_and_skips_disabled() {
        let temp_file = NamedTempFile::new().unwrap();
        let db = Database::new(temp_file.path()).await.unwrap();

        let mut registry = SourceRegistry::new();
        for id in ["beta", "alpha", "gamma", "dormant"] {
            assert!(registry.register(StubFetcher::valid(id)));
        }

        // First resolution creates all rows disabled — nothing runs yet
        let enabled = registry.enabled_sources(&db).await.unwrap();
        assert!(
            enabled.is_empty(),
            "freshly registered sources default to disabled"
        );

        for id in ["beta", "alpha", "gamma"] {
            db.set_source_enabled(id, true).await.unwrap();
        }
        db.update_source_config(
            "gamma",
            &crate::db::UpdateSourceConfig {
                priority: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let enabled = registry.enabled_sources(&db).await.unwrap();
        let order: Vec<&str> = enabled.iter().map(|(f, _)| f.source_id()).collect();
        assert_eq!(
            order,
            vec!["gamma", "alpha", "beta"],
            "priority ascending, alphabetical ties, disabled excluded"
        );

        db.close().await;
    }
}
