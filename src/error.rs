//! Error types for book-ingest
//!
//! This module provides error handling for the library, including:
//! - Domain-specific error types (Source, Database, Storage, etc.)
//! - A failure taxonomy ([`FailureClass`]) that drives the retry policy
//! - Context information (source id, storage path, config key, etc.)

use std::time::Duration;
use thiserror::Error;

/// Result type alias for book-ingest operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for book-ingest
///
/// This is the primary error type used throughout the library. Each variant includes
/// contextual information to help diagnose issues.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "storage.asset_root")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Network error from the HTTP client
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Provider transport or availability failure
    #[error("source '{source_id}' error: {message}")]
    Source {
        /// The source whose fetch failed
        source_id: String,
        /// What went wrong
        message: String,
    },

    /// Provider signalled an explicit rate limit
    #[error("source '{source_id}' rate limited, retry after {retry_after:?}")]
    RateLimited {
        /// The source that applied the limit
        source_id: String,
        /// Wait period advertised by the provider
        retry_after: Duration,
    },

    /// Downloaded asset failed validation (empty body, bad magic header, oversize)
    #[error("invalid asset: {0}")]
    InvalidAsset(String),

    /// Object storage operation failed
    #[error("storage error: {0}")]
    Storage(String),

    /// Object storage path is already occupied — writing would overwrite prior content
    #[error("storage path already occupied: {path}")]
    StorageCollision {
        /// The occupied path
        path: String,
    },

    /// Classification service call failed
    #[error("classification error: {0}")]
    Classification(String),

    /// Cover-search service call failed after all attempts
    #[error("cover search error: {0}")]
    CoverSearch(String),

    /// A fetcher failed contract validation at registration
    #[error("fetcher '{source_id}' rejected: {reason}")]
    InvalidFetcher {
        /// The source id the fetcher reported (may be empty)
        source_id: String,
        /// Why registration was refused
        reason: String,
    },

    /// Record already exists (dedup key conflict)
    #[error("duplicate record: {0}")]
    Duplicate(String),

    /// Requested entity not found
    #[error("not found: {0}")]
    NotFound(String),

    /// A job is already running on this ingestor
    #[error("a job is already running")]
    JobAlreadyRunning,

    /// Shutdown in progress - not accepting new jobs
    #[error("shutdown in progress: not accepting new jobs")]
    ShuttingDown,

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),

    /// Constraint violation (e.g., duplicate dedup key)
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
}

/// Failure taxonomy used by the retry policy and outcome accounting.
///
/// Each error maps to exactly one class; the orchestrator decides retry
/// behavior and per-item outcomes from the class, never from individual
/// error variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureClass {
    /// Network/timeout/5xx — retried with exponential backoff
    Transport,
    /// Explicit provider rate-limit signal — wait advertised period, retry once
    RateLimit,
    /// Empty or malformed asset — never retried
    ContentInvalid,
    /// Dedup key conflict — expected outcome, counted as skipped
    Duplicate,
    /// Store or write failure — retried with a small separate bound
    Persistence,
    /// Everything else — never retried
    Fatal,
}

impl Error {
    /// Classify this error into the failure taxonomy.
    pub fn class(&self) -> FailureClass {
        match self {
            // Transport: provider unreachable, connection problems, HTTP-level failure
            Error::Network(_) => FailureClass::Transport,
            Error::Source { .. } => FailureClass::Transport,
            Error::Io(e) => match e.kind() {
                std::io::ErrorKind::TimedOut
                | std::io::ErrorKind::ConnectionRefused
                | std::io::ErrorKind::ConnectionReset
                | std::io::ErrorKind::ConnectionAborted
                | std::io::ErrorKind::NotConnected
                | std::io::ErrorKind::BrokenPipe
                | std::io::ErrorKind::Interrupted => FailureClass::Transport,
                _ => FailureClass::Fatal,
            },

            Error::RateLimited { .. } => FailureClass::RateLimit,

            Error::InvalidAsset(_) => FailureClass::ContentInvalid,

            Error::Duplicate(_) => FailureClass::Duplicate,
            Error::Database(DatabaseError::ConstraintViolation(_)) => FailureClass::Duplicate,

            // Persistence: relational store and object store write failures
            Error::Database(_) | Error::Sqlx(_) | Error::Storage(_) => FailureClass::Persistence,

            // A collision means a dedup-engine miss, not a transient write failure
            Error::StorageCollision { .. } => FailureClass::Fatal,

            Error::Config { .. }
            | Error::Classification(_)
            | Error::CoverSearch(_)
            | Error::InvalidFetcher { .. }
            | Error::NotFound(_)
            | Error::JobAlreadyRunning
            | Error::ShuttingDown
            | Error::Serialization(_)
            | Error::Other(_) => FailureClass::Fatal,
        }
    }
}
