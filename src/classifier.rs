//! Classification service client
//!
//! Sends normalized metadata to the external AI classification service and
//! receives 1–3 genre tags plus an optional sub-genre. The service is
//! untrusted, best-effort input: its output is clamped to the fixed taxonomy
//! and failure is non-fatal — the caller proceeds with no genres and the
//! "Uncategorized" category.

use crate::config::ClassifierConfig;
use crate::error::{Error, Result};
use crate::types::{CanonicalFields, Classification, default_category};
use serde::{Deserialize, Serialize};

/// Fixed genre taxonomy the genre filter matches against
pub const GENRE_TAXONOMY: &[&str] = &[
    "Fiction",
    "Non-fiction",
    "Science",
    "History",
    "Philosophy",
    "Poetry",
    "Drama",
    "Biography",
    "Children",
    "Religion",
    "Travel",
    "Reference",
];

/// Maximum genre tags kept per item
const MAX_GENRES: usize = 3;

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    title: &'a str,
    author: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    year: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    #[serde(default)]
    genres: Vec<String>,
    #[serde(default)]
    sub_genre: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

/// Client for the external classification service
#[derive(Clone)]
pub struct ClassificationClient {
    client: reqwest::Client,
    config: ClassifierConfig,
}

impl ClassificationClient {
    /// Create a client from configuration
    pub fn new(config: ClassifierConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(Error::Network)?;

        Ok(Self { client, config })
    }

    /// Classify one item.
    ///
    /// When the service is disabled this short-circuits to the
    /// uncategorized fallback. Errors propagate so the caller can log them,
    /// but they are expected and degrade to the same fallback.
    pub async fn classify(&self, fields: &CanonicalFields) -> Result<Classification> {
        if !self.config.enabled {
            return Ok(Classification::uncategorized());
        }

        let request = ClassifyRequest {
            title: &fields.title,
            author: &fields.author,
            description: fields.description.as_deref(),
            year: fields.year,
        };

        let response = self
            .client
            .post(&self.config.endpoint)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Classification(format!(
                "service returned {status}"
            )));
        }

        let parsed: ClassifyResponse = response
            .json()
            .await
            .map_err(|e| Error::Classification(format!("malformed response: {e}")))?;

        // Clamp untrusted output: taxonomy members only, at most MAX_GENRES
        let genres: Vec<String> = parsed
            .genres
            .into_iter()
            .filter(|g| GENRE_TAXONOMY.contains(&g.as_str()))
            .take(MAX_GENRES)
            .collect();

        Ok(Classification {
            genres,
            sub_genre: parsed.sub_genre.filter(|s| !s.trim().is_empty()),
            category: parsed
                .category
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(default_category),
        })
    }
}
