//! Single-site PDF discovery adapter.
//!
//! Walks a site's paginated catalog pages (`/catalog?page=N`) and extracts
//! links to PDF files under `/files/`. This is the one sanctioned crawl in
//! the pipeline — no link-graph traversal, just page-by-page listing of a
//! known catalog layout.

use crate::error::{Error, Result};
use crate::fetcher::{BookFetcher, check_provider_status};
use crate::types::{AssetFormat, FetchOptions, FetcherMetadata, RawItem};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::time::Duration;

/// Adapter that discovers PDFs on a single site's catalog pages
pub struct ShelfScanFetcher {
    client: reqwest::Client,
    source_id: String,
    base_url: String,
    display_name: String,
    link_selector: Selector,
    author_selector: Selector,
}

impl ShelfScanFetcher {
    /// Create an adapter for one site.
    ///
    /// `source_id` must be lowercase alphanumeric/hyphen/underscore — it
    /// becomes half of every dedup key for this site.
    pub fn new(source_id: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let source_id = source_id.into();
        let base_url = base_url.into().trim_end_matches('/').to_string();

        let link_selector = Selector::parse(r#"a[href$=".pdf"]"#).map_err(|e| Error::Config {
            message: format!("invalid link selector: {e}"),
            key: None,
        })?;
        let author_selector = Selector::parse(".author").map_err(|e| Error::Config {
            message: format!("invalid author selector: {e}"),
            key: None,
        })?;

        Ok(Self {
            client: reqwest::Client::new(),
            display_name: format!("Shelf scan ({source_id})"),
            source_id,
            base_url,
            link_selector,
            author_selector,
        })
    }

    /// Extract candidate items from one catalog page.
    ///
    /// Kept synchronous: `Html` is not Send, so parsing must finish before
    /// the next await point.
    fn parse_catalog(&self, html: &str, batch_size: usize) -> Vec<RawItem> {
        let document = Html::parse_document(html);
        let mut items = Vec::new();

        for link in document.select(&self.link_selector) {
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            let Some(id) = Self::item_id_from_href(href) else {
                continue;
            };

            let text = link.text().collect::<String>().trim().to_string();
            let title = if text.is_empty() { id.clone() } else { text };

            // Catalog rows optionally carry an author span next to the link
            let author = link
                .parent()
                .and_then(scraper::ElementRef::wrap)
                .and_then(|parent| {
                    parent
                        .select(&self.author_selector)
                        .next()
                        .map(|el| el.text().collect::<String>().trim().to_string())
                })
                .filter(|a| !a.is_empty());

            items.push(RawItem {
                id,
                title,
                creators: author.into_iter().collect(),
                date: None,
                language: None,
                description: None,
                extra: serde_json::Value::Null,
            });

            if items.len() >= batch_size {
                break;
            }
        }

        items
    }

    /// Derive the stable item id from a PDF link: the final path segment
    /// without its extension.
    fn item_id_from_href(href: &str) -> Option<String> {
        let file = href.rsplit('/').next()?;
        let stem = file.strip_suffix(".pdf")?;
        if stem.is_empty() {
            None
        } else {
            Some(stem.to_string())
        }
    }
}

#[async_trait]
impl BookFetcher for ShelfScanFetcher {
    fn source_id(&self) -> &str {
        &self.source_id
    }

    fn metadata(&self) -> Result<FetcherMetadata> {
        Ok(FetcherMetadata {
            display_name: self.display_name.clone(),
            default_rate_limit: Duration::from_millis(2000),
            default_batch_size: 20,
            supported_formats: vec![AssetFormat::Pdf],
        })
    }

    async fn fetch_items(&self, options: &FetchOptions) -> Result<Vec<RawItem>> {
        let url = format!("{}/catalog?page={}", self.base_url, options.page);
        tracing::debug!(url = %url, "fetching catalog page");

        let response = self.client.get(&url).send().await?;

        // Past the last catalog page the site 404s; that is end-of-results,
        // not an availability failure.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        let response = check_provider_status(self.source_id(), response)?;

        let html = response.text().await?;
        Ok(self.parse_catalog(&html, options.batch_size))
    }

    async fn resolve_asset_url(
        &self,
        item_id: &str,
        format: AssetFormat,
    ) -> Result<Option<String>> {
        // The site only serves PDFs under /files/
        if format != AssetFormat::Pdf {
            return Ok(None);
        }
        Ok(Some(format!("{}/files/{}.pdf", self.base_url, item_id)))
    }
}
