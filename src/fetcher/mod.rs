//! Provider adapters
//!
//! Each external provider implements [`BookFetcher`]: list candidate items,
//! resolve a download URL, report metadata about itself. Provider quirks stay
//! behind this one contract — the orchestrator never branches on provider
//! identity. Fetchers hold no state between calls beyond caller-supplied
//! pagination cursors, which is what lets a paused job resume without
//! replaying from the start.

use crate::error::{Error, Result};
use crate::types::{AssetFormat, FetchOptions, FetcherMetadata, RawItem};
use async_trait::async_trait;
use std::time::Duration;

mod archive;
mod shelf_scan;

pub use archive::ArchiveFetcher;
pub use shelf_scan::ShelfScanFetcher;

/// Wait period assumed when a provider rate-limits without a Retry-After header
pub(crate) const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Contract implemented by every provider adapter
#[async_trait]
pub trait BookFetcher: Send + Sync {
    /// Stable, unique source id (lowercase alphanumeric, hyphen, underscore)
    fn source_id(&self) -> &str;

    /// Static metadata about this provider.
    ///
    /// Fallible so a misbehaving adapter is detectable at registration time;
    /// a failing fetcher is excluded from the registry without affecting
    /// others.
    fn metadata(&self) -> Result<FetcherMetadata>;

    /// List one page of candidate items.
    ///
    /// Zero results return an empty Vec; `Err` is reserved for
    /// transport/availability failure.
    async fn fetch_items(&self, options: &FetchOptions) -> Result<Vec<RawItem>>;

    /// Resolve the download URL for an item in the preferred format.
    ///
    /// Returns `Ok(None)` when the provider has no asset in that format.
    async fn resolve_asset_url(
        &self,
        item_id: &str,
        format: AssetFormat,
    ) -> Result<Option<String>>;
}

/// Map a provider HTTP response onto the failure taxonomy.
///
/// 429 becomes [`Error::RateLimited`] carrying the advertised wait period;
/// any other non-success status becomes a transport-class [`Error::Source`].
pub(crate) fn check_provider_status(
    source_id: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_RETRY_AFTER);
        return Err(Error::RateLimited {
            source_id: source_id.to_string(),
            retry_after,
        });
    }

    if !status.is_success() {
        return Err(Error::Source {
            source_id: source_id.to_string(),
            message: format!("unexpected status {status}"),
        });
    }

    Ok(response)
}
