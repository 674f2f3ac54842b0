//! Paged JSON search API adapter.
//!
//! Talks to an archive.org-compatible advanced search endpoint: one GET per
//! page, JSON envelope with a `docs` array, download URLs derived from the
//! item identifier. The base URL is configurable so tests (and mirrors) can
//! point it anywhere.

use crate::error::Result;
use crate::fetcher::{BookFetcher, check_provider_status};
use crate::types::{AssetFormat, FetchOptions, FetcherMetadata, RawItem};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer};
use std::time::Duration;

/// Adapter for an archive.org-style search API
pub struct ArchiveFetcher {
    client: reqwest::Client,
    base_url: String,
    collection: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    response: SearchResponse,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    docs: Vec<SearchDoc>,
}

/// One search hit. The API is loose about cardinality — `creator`,
/// `language`, and `description` arrive as either a string or an array.
#[derive(Debug, Deserialize)]
struct SearchDoc {
    identifier: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    creator: Vec<String>,
    #[serde(default)]
    date: Option<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    language: Vec<String>,
    #[serde(default, deserialize_with = "one_or_many")]
    description: Vec<String>,
}

fn one_or_many<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(value)) => vec![value],
        Some(OneOrMany::Many(values)) => values,
    })
}

impl ArchiveFetcher {
    /// Create an adapter against the given API base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            collection: None,
        }
    }

    /// Restrict searches to one collection
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    fn search_query(&self, language: Option<&str>) -> String {
        let mut query = String::from("mediatype:texts AND format:pdf");
        if let Some(collection) = &self.collection {
            query.push_str(&format!(" AND collection:{collection}"));
        }
        if let Some(language) = language {
            query.push_str(&format!(" AND language:{language}"));
        }
        query
    }
}

#[async_trait]
impl BookFetcher for ArchiveFetcher {
    fn source_id(&self) -> &str {
        "archive"
    }

    fn metadata(&self) -> Result<FetcherMetadata> {
        Ok(FetcherMetadata {
            display_name: "Internet Archive".to_string(),
            default_rate_limit: Duration::from_millis(1500),
            default_batch_size: 50,
            supported_formats: vec![AssetFormat::Pdf, AssetFormat::Epub],
        })
    }

    async fn fetch_items(&self, options: &FetchOptions) -> Result<Vec<RawItem>> {
        let query = self.search_query(options.language.as_deref());
        let url = format!(
            "{}/advancedsearch.php?q={}&fl%5B%5D=identifier&fl%5B%5D=title&fl%5B%5D=creator&fl%5B%5D=date&fl%5B%5D=language&fl%5B%5D=description&rows={}&page={}&output=json",
            self.base_url,
            urlencoding::encode(&query),
            options.batch_size,
            options.page
        );

        tracing::debug!(url = %url, "fetching archive search page");

        let response = self.client.get(&url).send().await?;
        let response = check_provider_status(self.source_id(), response)?;
        let envelope: SearchEnvelope = response.json().await?;

        let items = envelope
            .response
            .docs
            .into_iter()
            .map(|doc| RawItem {
                title: doc.title.unwrap_or_else(|| doc.identifier.clone()),
                id: doc.identifier,
                creators: doc.creator,
                date: doc.date,
                language: doc.language.into_iter().next(),
                description: doc.description.into_iter().next(),
                extra: serde_json::Value::Null,
            })
            .collect();

        Ok(items)
    }

    async fn resolve_asset_url(
        &self,
        item_id: &str,
        format: AssetFormat,
    ) -> Result<Option<String>> {
        // Download URLs are derived from the identifier; no network call needed
        Ok(Some(format!(
            "{}/download/{}/{}.{}",
            self.base_url,
            item_id,
            item_id,
            format.extension()
        )))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn docs_body(docs: serde_json::Value) -> serde_json::Value {
        serde_json::json!({ "response": { "numFound": 2, "docs": docs } })
    }

    #[tokio::test]
    async fn parses_docs_with_mixed_cardinality_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/advancedsearch.php"))
            .respond_with(ResponseTemplate::new(200).set_body_json(docs_body(serde_json::json!([
                {
                    "identifier": "prideandprejudice1813",
                    "title": "Pride and Prejudice",
                    "creator": "Jane Austen",
                    "date": "1813-01-28",
                    "language": ["en", "eng"],
                    "description": "A novel of manners"
                },
                {
                    "identifier": "bare-item"
                }
            ]))))
            .mount(&server)
            .await;

        let fetcher = ArchiveFetcher::new(server.uri());
        let items = fetcher
            .fetch_items(&FetchOptions {
                batch_size: 10,
                page: 1,
                language: None,
            })
            .await
            .unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].id, "prideandprejudice1813");
        assert_eq!(items[0].creators, vec!["Jane Austen"]);
        assert_eq!(items[0].language.as_deref(), Some("en"));
        assert_eq!(items[0].description.as_deref(), Some("A novel of manners"));

        // Missing fields degrade gracefully: title falls back to identifier
        assert_eq!(items[1].title, "bare-item");
        assert!(items[1].creators.is_empty());
        assert!(items[1].date.is_none());
    }

    #[tokio::test]
    async fn zero_results_is_an_empty_vec_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/advancedsearch.php"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(docs_body(serde_json::json!([]))),
            )
            .mount(&server)
            .await;

        let fetcher = ArchiveFetcher::new(server.uri());
        let items = fetcher
            .fetch_items(&FetchOptions {
                batch_size: 10,
                page: 99,
                language: None,
            })
            .await
            .unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn requested_page_and_batch_size_are_forwarded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/advancedsearch.php"))
            .and(query_param("rows", "5"))
            .and(query_param("page", "3"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(docs_body(serde_json::json!([]))),
            )
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = ArchiveFetcher::new(server.uri());
        fetcher
            .fetch_items(&FetchOptions {
                batch_size: 5,
                page: 3,
                language: None,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn server_error_surfaces_as_source_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/advancedsearch.php"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let fetcher = ArchiveFetcher::new(server.uri());
        let err = fetcher
            .fetch_items(&FetchOptions {
                batch_size: 10,
                page: 1,
                language: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Source { .. }));
    }

    #[tokio::test]
    async fn rate_limit_response_maps_to_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/advancedsearch.php"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "2"))
            .mount(&server)
            .await;

        let fetcher = ArchiveFetcher::new(server.uri());
        let err = fetcher
            .fetch_items(&FetchOptions {
                batch_size: 10,
                page: 1,
                language: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RateLimited { .. }));
    }

    #[tokio::test]
    async fn asset_url_is_deterministic_from_identifier() {
        let fetcher = ArchiveFetcher::new("https://archive.example");
        let url = fetcher
            .resolve_asset_url("some-item", AssetFormat::Pdf)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            url,
            "https://archive.example/download/some-item/some-item.pdf"
        );
    }

    #[test]
    fn language_filter_lands_in_the_query() {
        let fetcher = ArchiveFetcher::new("https://archive.example").with_collection("opensource");
        let query = fetcher.search_query(Some("en"));
        assert!(query.contains("collection:opensource"));
        assert!(query.contains("language:en"));
    }
}
