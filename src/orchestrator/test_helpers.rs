//! Shared test helpers for orchestrator tests: a scriptable fetcher and an
//! ingestor wired to temp storage with external services disabled.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::fetcher::BookFetcher;
use crate::orchestrator::Ingestor;
use crate::registry::SourceRegistry;
use crate::types::{AssetFormat, FetchOptions, FetcherMetadata, RawItem};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Scriptable in-process fetcher
pub(crate) struct MockFetcher {
    id: String,
    asset_base: String,
    items: Vec<RawItem>,
    /// true: items only on page 1, empty afterwards; false: same items on every page
    paged: bool,
    /// Remaining fetch_items calls to fail with a transport error
    fail_fetches: AtomicU32,
    /// Remaining fetch_items calls to answer with a rate-limit signal
    rate_limits: AtomicU32,
    /// Total fetch_items invocations observed
    pub(crate) fetch_calls: AtomicU32,
}

impl MockFetcher {
    pub(crate) fn new(id: &str, asset_base: &str) -> Self {
        Self {
            id: id.to_string(),
            asset_base: asset_base.trim_end_matches('/').to_string(),
            items: Vec::new(),
            paged: false,
            fail_fetches: AtomicU32::new(0),
            rate_limits: AtomicU32::new(0),
            fetch_calls: AtomicU32::new(0),
        }
    }

    pub(crate) fn with_items(mut self, items: Vec<RawItem>) -> Self {
        self.items = items;
        self
    }

    pub(crate) fn paged(mut self) -> Self {
        self.paged = true;
        self
    }

    pub(crate) fn fail_all_fetches(self) -> Self {
        self.fail_fetches.store(u32::MAX, Ordering::SeqCst);
        self
    }

    pub(crate) fn rate_limit_first_call(self) -> Self {
        self.rate_limits.store(1, Ordering::SeqCst);
        self
    }
}

#[async_trait]
impl BookFetcher for MockFetcher {
    fn source_id(&self) -> &str {
        &self.id
    }

    fn metadata(&self) -> Result<FetcherMetadata> {
        Ok(FetcherMetadata {
            display_name: format!("Mock ({})", self.id),
            default_rate_limit: Duration::from_millis(1),
            default_batch_size: 25,
            supported_formats: vec![AssetFormat::Pdf],
        })
    }

    async fn fetch_items(&self, options: &FetchOptions) -> Result<Vec<RawItem>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        if self.rate_limits.load(Ordering::SeqCst) > 0 {
            self.rate_limits.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::RateLimited {
                source_id: self.id.clone(),
                retry_after: Duration::from_millis(50),
            });
        }

        if self.fail_fetches.load(Ordering::SeqCst) > 0 {
            if self.fail_fetches.load(Ordering::SeqCst) != u32::MAX {
                self.fail_fetches.fetch_sub(1, Ordering::SeqCst);
            }
            return Err(Error::Source {
                source_id: self.id.clone(),
                message: "provider unreachable".to_string(),
            });
        }

        if self.paged && options.page > 1 {
            return Ok(Vec::new());
        }

        Ok(self
            .items
            .iter()
            .take(options.batch_size)
            .cloned()
            .collect())
    }

    async fn resolve_asset_url(
        &self,
        item_id: &str,
        format: AssetFormat,
    ) -> Result<Option<String>> {
        if format != AssetFormat::Pdf {
            return Ok(None);
        }
        Ok(Some(format!(
            "{}/files/{}.pdf",
            self.asset_base, item_id
        )))
    }
}

pub(crate) fn raw_item(id: &str, author: &str) -> RawItem {
    RawItem {
        id: id.to_string(),
        title: format!("Title of {id}"),
        creators: if author.is_empty() {
            vec![]
        } else {
            vec![author.to_string()]
        },
        date: Some("1900".to_string()),
        language: Some("en".to_string()),
        description: None,
        extra: serde_json::Value::Null,
    }
}

/// Serve a valid PDF body for one item id
pub(crate) async fn mount_pdf(server: &MockServer, item_id: &str) {
    let mut body = b"%PDF-1.4\n".to_vec();
    body.extend_from_slice(item_id.as_bytes());
    mount_asset(server, item_id, body, 0).await;
}

/// Serve an arbitrary body for one item id, optionally delayed
pub(crate) async fn mount_asset(server: &MockServer, item_id: &str, body: Vec<u8>, delay_ms: u64) {
    let mut template = ResponseTemplate::new(200).set_body_bytes(body);
    if delay_ms > 0 {
        template = template.set_delay(Duration::from_millis(delay_ms));
    }
    Mock::given(method("GET"))
        .and(path(format!("/files/{item_id}.pdf")))
        .respond_with(template)
        .mount(server)
        .await;
}

/// Build an ingestor over temp storage with external services disabled and
/// fast retry policies. Returns the ingestor and the tempdir (which must be
/// kept alive).
pub(crate) async fn create_test_ingestor(registry: SourceRegistry) -> (Ingestor, TempDir) {
    create_test_ingestor_with(registry, |_| {}).await
}

/// Like [`create_test_ingestor`] but lets the test adjust the config
/// (filters, classifier endpoint, ...) before construction.
pub(crate) async fn create_test_ingestor_with(
    registry: SourceRegistry,
    adjust: impl FnOnce(&mut Config),
) -> (Ingestor, TempDir) {
    let temp_dir = TempDir::new().unwrap();

    let mut config = Config::default();
    config.persistence.database_path = temp_dir.path().join("test.db");
    config.storage.asset_root = temp_dir.path().join("assets");
    config.storage.public_base_url = "http://assets.test".to_string();
    config.classifier.enabled = false;
    config.cover_search.enabled = false;
    config.ingest.default_rate_limit = Duration::from_millis(1);
    config.retry.transport.max_attempts = 1;
    config.retry.transport.initial_delay = Duration::from_millis(5);
    config.retry.transport.jitter = false;
    config.retry.persistence.max_attempts = 1;
    config.retry.persistence.initial_delay = Duration::from_millis(5);

    adjust(&mut config);

    let ingestor = Ingestor::new(config, registry).await.unwrap();
    (ingestor, temp_dir)
}

/// Enable a source at the given priority (rows exist after one resolution)
pub(crate) async fn enable_source(ingestor: &Ingestor, source: &str, priority: i64) {
    ingestor.db.ensure_source_config(source).await.unwrap();
    ingestor.db.set_source_enabled(source, true).await.unwrap();
    ingestor
        .db
        .update_source_config(
            source,
            &crate::db::UpdateSourceConfig {
                priority: Some(priority),
                ..Default::default()
            },
        )
        .await
        .unwrap();
}
