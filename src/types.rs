//! Core types for book-ingest

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Provider-native representation of a candidate item returned by a fetcher.
///
/// Ephemeral — exists only for the duration of a fetch call. Field shapes stay
/// close to what providers actually return; normalization into
/// [`CanonicalFields`] happens in the metadata mapper.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawItem {
    /// Provider-native identifier, unique within that provider
    pub id: String,

    /// Item title as reported by the provider
    pub title: String,

    /// One or many creator names
    #[serde(default)]
    pub creators: Vec<String>,

    /// Free-text publication date (never parsed by fetchers)
    #[serde(default)]
    pub date: Option<String>,

    /// Language code or name, if the provider reports one
    #[serde(default)]
    pub language: Option<String>,

    /// Free-text description
    #[serde(default)]
    pub description: Option<String>,

    /// Provider-specific extra fields, carried opaquely
    #[serde(default)]
    pub extra: serde_json::Value,
}

/// Normalized metadata produced by the mapper from a [`RawItem`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalFields {
    /// Title, trimmed
    pub title: String,
    /// Single normalized author string (multiple creators joined with `", "`)
    pub author: String,
    /// Four-digit publication year, if one could be extracted
    pub year: Option<i32>,
    /// Language, if present and non-empty
    pub language: Option<String>,
    /// Description, if present and non-empty
    pub description: Option<String>,
}

/// Binary asset format a fetcher can resolve
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetFormat {
    /// PDF document (validated against the PDF magic header)
    #[default]
    Pdf,
    /// EPUB document
    Epub,
}

impl AssetFormat {
    /// File extension for storage paths
    pub fn extension(&self) -> &'static str {
        match self {
            AssetFormat::Pdf => "pdf",
            AssetFormat::Epub => "epub",
        }
    }
}

/// Static metadata a fetcher reports about itself at registration
#[derive(Clone, Debug)]
pub struct FetcherMetadata {
    /// Human-readable provider name
    pub display_name: String,
    /// Default minimum delay between requests to this provider
    pub default_rate_limit: std::time::Duration,
    /// Default number of items per fetch page
    pub default_batch_size: usize,
    /// Formats this provider can resolve asset URLs for
    pub supported_formats: Vec<AssetFormat>,
}

/// Options passed to [`crate::fetcher::BookFetcher::fetch_items`]
#[derive(Clone, Debug)]
pub struct FetchOptions {
    /// Maximum number of items to return
    pub batch_size: usize,
    /// 1-based page cursor
    pub page: u32,
    /// Restrict results to a language, if the provider supports it
    pub language: Option<String>,
}

/// Pipeline stage at which an item failed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Listing candidate items from the provider
    Fetch,
    /// External classification call
    Classify,
    /// Allow/deny filter gates
    Filter,
    /// Asset download and validation
    Validate,
    /// Object storage upload
    Store,
    /// Canonical record insert
    Persist,
}

/// Terminal status of an orchestrator job
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Every processed item succeeded or was an expected skip
    Completed,
    /// Some failures alongside successes
    Partial,
    /// Systemic failure before any item could be processed
    Failed,
}

impl JobStatus {
    /// Stable string code for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Completed => "completed",
            JobStatus::Partial => "partial",
            JobStatus::Failed => "failed",
        }
    }

    /// Decode a stored string code, defaulting to Failed for unknown values
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "completed" => JobStatus::Completed,
            "partial" => JobStatus::Partial,
            _ => JobStatus::Failed,
        }
    }
}

/// Outcome of a single per-source run, recorded in source statistics
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceRunStatus {
    /// No item failures and no source-level failure
    Succeeded,
    /// Some items failed but the run made progress
    Partial,
    /// The source could not be fetched at all
    Failed,
}

impl SourceRunStatus {
    /// Stable string code for database storage
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceRunStatus::Succeeded => "succeeded",
            SourceRunStatus::Partial => "partial",
            SourceRunStatus::Failed => "failed",
        }
    }

    /// Decode a stored string code, defaulting to Failed for unknown values
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "succeeded" => SourceRunStatus::Succeeded,
            "partial" => SourceRunStatus::Partial,
            _ => SourceRunStatus::Failed,
        }
    }
}

/// Health status derived from source statistics at read time
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Recent successful run, low error rate
    Healthy,
    /// No recent success or elevated error rate
    Warning,
    /// Last run failed outright
    Failed,
}

/// One item-level error recorded in a source report (bounded list)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ItemError {
    /// Provider-native item id
    pub item_id: String,
    /// Stage at which the item failed
    pub stage: Stage,
    /// Error message
    pub message: String,
}

/// Per-source outcome tallies within a job result.
///
/// Invariant: `added + skipped + failed == processed`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SourceReport {
    /// Source id
    pub source: String,
    /// Items examined
    pub processed: u64,
    /// Items persisted (or, in a dry run, items that would have been persisted)
    pub added: u64,
    /// Duplicates and filter rejections
    pub skipped: u64,
    /// Items that failed at some stage
    pub failed: u64,
    /// Bounded list of item-level errors
    pub errors: Vec<ItemError>,
}

/// Result of one orchestrator invocation. Immutable once written.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobResult {
    /// Terminal status
    pub status: JobStatus,
    /// When the job started
    pub started_at: DateTime<Utc>,
    /// When the job finished (or was stopped)
    pub finished_at: DateTime<Utc>,
    /// Whether this was a dry run (no writes performed)
    pub dry_run: bool,
    /// Per-source reports in processing order
    pub sources: Vec<SourceReport>,
}

impl JobResult {
    /// Sum of processed counts across sources
    pub fn total_processed(&self) -> u64 {
        self.sources.iter().map(|s| s.processed).sum()
    }

    /// Sum of failed counts across sources
    pub fn total_failed(&self) -> u64 {
        self.sources.iter().map(|s| s.failed).sum()
    }
}

/// Options for a single orchestrator invocation
#[derive(Clone, Debug, Default)]
pub struct JobOptions {
    /// Override the per-source batch size
    pub batch_size: Option<usize>,
    /// Execute the full decision pipeline but skip every write
    pub dry_run: bool,
    /// Restrict fetching to a language
    pub language: Option<String>,
}

/// Genre assignment returned by the classification service
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Classification {
    /// 0–3 genre tags from the fixed taxonomy
    #[serde(default)]
    pub genres: Vec<String>,
    /// Optional sub-genre
    #[serde(default)]
    pub sub_genre: Option<String>,
    /// Category label; "Uncategorized" when classification failed
    #[serde(default = "default_category")]
    pub category: String,
}

pub(crate) fn default_category() -> String {
    "Uncategorized".to_string()
}

impl Classification {
    /// Fallback used when the classification service is disabled or failing
    pub fn uncategorized() -> Self {
        Self {
            genres: Vec::new(),
            sub_genre: None,
            category: default_category(),
        }
    }
}

/// Cover image located by the cover-search service
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CoverArt {
    /// Image URL, or None when the service returned a placeholder indicator
    pub url: Option<String>,
    /// Which provider the image came from
    #[serde(default)]
    pub provider: Option<String>,
}

/// Event emitted during the ingestion lifecycle
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A job started
    JobStarted {
        /// Whether the job is a dry run
        dry_run: bool,
    },

    /// Processing of a source began
    SourceStarted {
        /// Source id
        source: String,
    },

    /// An item was persisted (or would have been, in a dry run)
    ItemPersisted {
        /// Source id
        source: String,
        /// Provider-native item id
        item_id: String,
        /// Normalized title
        title: String,
    },

    /// An item was skipped (duplicate or filter rejection)
    ItemSkipped {
        /// Source id
        source: String,
        /// Provider-native item id
        item_id: String,
        /// Why the item was skipped
        reason: String,
    },

    /// An item failed at some stage
    ItemFailed {
        /// Source id
        source: String,
        /// Provider-native item id
        item_id: String,
        /// Stage at which it failed
        stage: Stage,
        /// Error message
        error: String,
    },

    /// Processing of a source finished
    SourceCompleted {
        /// Source id
        source: String,
        /// Items examined
        processed: u64,
        /// Items persisted
        added: u64,
        /// Items skipped
        skipped: u64,
        /// Items failed
        failed: u64,
    },

    /// Cover search gave up after its bounded retries; ingestion continued
    CoverSearchFailed {
        /// Source id
        source: String,
        /// Provider-native item id
        item_id: String,
        /// Last error message
        error: String,
    },

    /// The running job was paused (takes effect between items)
    JobPaused,

    /// The paused job resumed
    JobResumed,

    /// The running job was stopped; its result was finalized
    JobStopped,

    /// A job finished
    JobCompleted {
        /// Terminal status
        status: JobStatus,
    },

    /// Graceful shutdown initiated
    Shutdown,
}
