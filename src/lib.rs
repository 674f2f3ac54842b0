//! # book-ingest
//!
//! Multi-source book ingestion pipeline library.
//!
//! ## Design Philosophy
//!
//! book-ingest is designed to be:
//! - **Idempotent** - Re-running a job over the same upstream data never duplicates records
//! - **Resilient** - A failing item or a degraded provider never aborts the batch
//! - **Pluggable** - Provider quirks stay behind one fetcher contract
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use book_ingest::{ArchiveFetcher, Config, Ingestor, JobOptions, SourceRegistry};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut registry = SourceRegistry::new();
//!     registry.register(Arc::new(ArchiveFetcher::new("https://archive.org")));
//!
//!     let ingestor = Ingestor::new(Config::default(), registry).await?;
//!
//!     // Subscribe to events
//!     let mut events = ingestor.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     // Sources start disabled; enable the ones that should run
//!     ingestor.db.ensure_source_config("archive").await?;
//!     ingestor.db.set_source_enabled("archive", true).await?;
//!
//!     let result = ingestor.run_job(JobOptions::default()).await?;
//!     println!("job finished: {:?}", result.status);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Classification service client
pub mod classifier;
/// Configuration types
pub mod config;
/// Cover-search service client
pub mod covers;
/// Database persistence layer
pub mod db;
/// Deduplication engine
pub mod dedup;
/// Error types
pub mod error;
/// Provider adapters
pub mod fetcher;
/// Allow/deny filter gates
pub mod filter;
/// Metadata normalization
pub mod mapper;
/// Core orchestrator implementation (decomposed into focused submodules)
pub mod orchestrator;
/// Source registry
pub mod registry;
/// Retry logic with exponential backoff
pub mod retry;
/// Periodic job trigger
pub mod scheduler;
/// Source health derivation
pub mod stats;
/// Asset storage
pub mod storage;
/// Core types and events
pub mod types;
/// Content validation
pub mod validator;

// Re-export commonly used types
pub use config::{Config, FilterConfig, RetryConfig};
pub use db::Database;
pub use error::{DatabaseError, Error, FailureClass, Result};
pub use fetcher::{ArchiveFetcher, BookFetcher, ShelfScanFetcher};
pub use orchestrator::{ControlState, Ingestor, JobControl};
pub use registry::SourceRegistry;
pub use scheduler::IngestScheduler;
pub use stats::{SourceHealth, derive_health};
pub use storage::{AssetStore, FsAssetStore};
pub use types::{
    AssetFormat, CanonicalFields, Event, FetchOptions, FetcherMetadata, HealthStatus, JobOptions,
    JobResult, JobStatus, RawItem, SourceReport, SourceRunStatus, Stage,
};

/// Helper function to run the ingestor with graceful signal handling.
///
/// Waits for a termination signal and then calls the ingestor's `shutdown()`
/// method, which refuses new jobs and stops the running one at the next item
/// boundary.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use book_ingest::{Config, Ingestor, SourceRegistry, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let ingestor = Ingestor::new(Config::default(), SourceRegistry::new()).await?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(ingestor).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(ingestor: Ingestor) -> Result<()> {
    wait_for_signal().await;
    ingestor.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
