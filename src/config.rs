//! Configuration types for book-ingest

use crate::types::AssetFormat;
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Ingestion behavior configuration (batch sizing, rate limits, error bounds)
///
/// Groups settings that control how candidate items are pulled from providers.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Items per fetch page when neither the job options nor the source
    /// configuration override it (default: 25)
    #[serde(default = "default_batch_size")]
    pub default_batch_size: usize,

    /// Minimum delay between requests to one provider when the source
    /// configuration does not set one (default: 1000 ms)
    #[serde(default = "default_rate_limit", with = "duration_ms_serde")]
    pub default_rate_limit: Duration,

    /// Restrict fetching to a language by default (None = all languages)
    #[serde(default)]
    pub language: Option<String>,

    /// Maximum item-level errors kept per source in a job result (default: 20)
    ///
    /// Errors beyond the bound still count toward the failed tally; only the
    /// detail entries are capped.
    #[serde(default = "default_max_errors")]
    pub max_errors_per_source: usize,

    /// Asset format requested from providers (default: pdf)
    #[serde(default)]
    pub preferred_format: AssetFormat,

    /// Maximum accepted asset size in bytes (default: 256 MiB)
    #[serde(default = "default_max_asset_bytes")]
    pub max_asset_bytes: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            default_batch_size: default_batch_size(),
            default_rate_limit: default_rate_limit(),
            language: None,
            max_errors_per_source: default_max_errors(),
            preferred_format: AssetFormat::default(),
            max_asset_bytes: default_max_asset_bytes(),
        }
    }
}

/// Allow-list filter configuration
///
/// Each gate is evaluated only when its flag is set. An enabled gate with an
/// empty allow-list allows everything (fail-open) so a misconfigured
/// deployment never blacks out ingestion entirely.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Enable the genre gate (default: false)
    #[serde(default)]
    pub enable_genre_filter: bool,

    /// Genres that pass the genre gate (case-sensitive, fixed taxonomy)
    #[serde(default)]
    pub allowed_genres: Vec<String>,

    /// Enable the author gate (default: false)
    #[serde(default)]
    pub enable_author_filter: bool,

    /// Author substrings that pass the author gate (case-insensitive)
    #[serde(default)]
    pub allowed_authors: Vec<String>,
}

/// Retry configuration for one failure class
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Retry policy, parameterized per failure-taxonomy class
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryPolicyConfig {
    /// Policy for transport failures (network, timeouts, 5xx)
    #[serde(default)]
    pub transport: RetryConfig,

    /// Policy for persistence failures (store and database writes)
    #[serde(default = "default_persistence_retry")]
    pub persistence: RetryConfig,
}

impl Default for RetryPolicyConfig {
    fn default() -> Self {
        Self {
            transport: RetryConfig::default(),
            persistence: default_persistence_retry(),
        }
    }
}

/// Object storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory of the object store (default: "assets")
    #[serde(default = "default_asset_root")]
    pub asset_root: PathBuf,

    /// Base URL under which stored objects are publicly reachable
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            asset_root: default_asset_root(),
            public_base_url: default_public_base_url(),
        }
    }
}

/// Classification service configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Enable classification (default: true). When disabled, items proceed
    /// with no genres and the "Uncategorized" category.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Service endpoint
    #[serde(default = "default_classifier_endpoint")]
    pub endpoint: String,

    /// Request timeout (default: 30 seconds)
    #[serde(default = "default_service_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_classifier_endpoint(),
            timeout: default_service_timeout(),
        }
    }
}

/// Cover-search service configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CoverSearchConfig {
    /// Enable cover search (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Service endpoint
    #[serde(default = "default_cover_endpoint")]
    pub endpoint: String,

    /// Attempts before giving up (default: 3)
    #[serde(default = "default_cover_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between attempts (default: 2 seconds)
    #[serde(default = "default_cover_delay", with = "duration_serde")]
    pub retry_delay: Duration,

    /// Request timeout (default: 30 seconds)
    #[serde(default = "default_service_timeout", with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for CoverSearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_cover_endpoint(),
            max_attempts: default_cover_attempts(),
            retry_delay: default_cover_delay(),
            timeout: default_service_timeout(),
        }
    }
}

/// Data storage and state management configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Database path (default: "book-ingest.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Periodic trigger configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Enable the periodic trigger (default: false; manual triggers always work)
    #[serde(default)]
    pub enabled: bool,

    /// Interval between scheduled jobs (default: 6 hours)
    #[serde(default = "default_schedule_interval", with = "duration_serde")]
    pub interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: default_schedule_interval(),
        }
    }
}

/// Main configuration for the ingestor
///
/// Fields are organized into logical sub-configs:
/// - [`ingest`](IngestConfig) — batch sizing, rate limits, error bounds
/// - [`filters`](FilterConfig) — genre/author allow-list gates
/// - [`retry`](RetryPolicyConfig) — backoff policy per failure class
/// - [`storage`](StorageConfig) — object store root and public URL
/// - [`classifier`](ClassifierConfig) / [`cover_search`](CoverSearchConfig) —
///   external service endpoints
/// - [`persistence`](PersistenceConfig) — database location
/// - [`scheduler`](SchedulerConfig) — periodic trigger
///
/// The ingest sub-config is flattened for a compact serialized form; the rest
/// are nested under their own keys.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Ingestion behavior settings
    #[serde(flatten)]
    pub ingest: IngestConfig,

    /// Allow-list filter gates
    #[serde(default)]
    pub filters: FilterConfig,

    /// Retry policy per failure class
    #[serde(default)]
    pub retry: RetryPolicyConfig,

    /// Object storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Classification service settings
    #[serde(default)]
    pub classifier: ClassifierConfig,

    /// Cover-search service settings
    #[serde(default)]
    pub cover_search: CoverSearchConfig,

    /// Data storage and state management
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Periodic trigger settings
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

// Default value functions
fn default_batch_size() -> usize {
    25
}

fn default_rate_limit() -> Duration {
    Duration::from_millis(1000)
}

fn default_max_errors() -> usize {
    20
}

fn default_max_asset_bytes() -> u64 {
    256 * 1024 * 1024
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_persistence_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 2,
        initial_delay: Duration::from_millis(200),
        max_delay: Duration::from_secs(5),
        backoff_multiplier: 2.0,
        jitter: false,
    }
}

fn default_asset_root() -> PathBuf {
    PathBuf::from("assets")
}

fn default_public_base_url() -> String {
    "http://localhost:8080/assets".to_string()
}

fn default_classifier_endpoint() -> String {
    "http://localhost:8090/classify".to_string()
}

fn default_cover_endpoint() -> String {
    "http://localhost:8090/covers".to_string()
}

fn default_cover_attempts() -> u32 {
    3
}

fn default_cover_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_service_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_database_path() -> PathBuf {
    PathBuf::from("book-ingest.db")
}

fn default_schedule_interval() -> Duration {
    Duration::from_secs(6 * 60 * 60)
}

// Duration serialization helper (seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Duration serialization helper (milliseconds, for sub-second rate limits)
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
