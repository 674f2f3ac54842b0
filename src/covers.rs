//! Cover-search service client
//!
//! Looks up cover art for a book via the external cover-search service.
//! Failures are retried a bounded number of times with a short fixed delay;
//! on exhaustion the caller records a named notification and ingestion
//! continues without a cover — cover art never blocks the pipeline.

use crate::config::CoverSearchConfig;
use crate::error::{Error, Result};
use crate::types::CoverArt;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct CoverRequest<'a> {
    title: &'a str,
    author: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    isbn: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct CoverResponse {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    placeholder: bool,
}

/// Client for the external cover-search service
#[derive(Clone)]
pub struct CoverSearchClient {
    client: reqwest::Client,
    config: CoverSearchConfig,
}

impl CoverSearchClient {
    /// Create a client from configuration
    pub fn new(config: CoverSearchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(Error::Network)?;

        Ok(Self { client, config })
    }

    /// Look up cover art, retrying up to the configured bound.
    ///
    /// Returns `Ok` with `url: None` when the service indicates a
    /// placeholder; returns `Err` only after every attempt failed.
    pub async fn lookup(
        &self,
        title: &str,
        author: &str,
        isbn: Option<&str>,
    ) -> Result<CoverArt> {
        if !self.config.enabled {
            return Ok(CoverArt {
                url: None,
                provider: None,
            });
        }

        let attempts = self.config.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.lookup_once(title, author, isbn).await {
                Ok(cover) => return Ok(cover),
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        "cover search attempt failed"
                    );
                    last_error = e.to_string();
                    if attempt < attempts {
                        tokio::time::sleep(self.config.retry_delay).await;
                    }
                }
            }
        }

        Err(Error::CoverSearch(format!(
            "exhausted {attempts} attempts: {last_error}"
        )))
    }

    async fn lookup_once(
        &self,
        title: &str,
        author: &str,
        isbn: Option<&str>,
    ) -> Result<CoverArt> {
        let request = CoverRequest {
            title,
            author,
            isbn,
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::CoverSearch(format!("service returned {status}")));
        }

        let parsed: CoverResponse = response
            .json()
            .await
            .map_err(|e| Error::CoverSearch(format!("malformed response: {e}")))?;

        if parsed.placeholder {
            return Ok(CoverArt {
                url: None,
                provider: parsed.source,
            });
        }

        Ok(CoverArt {
            url: parsed.url.filter(|u| !u.trim().is_empty()),
            provider: parsed.source,
        })
    }
}
