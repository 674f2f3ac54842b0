//! Asset storage
//!
//! Durable object storage for validated binaries behind the [`AssetStore`]
//! trait, so deployments can swap the filesystem store for a bucket-backed
//! one. The contract every implementation honors: an `exists` pre-check and
//! an `upload` that never overwrites — an occupied path is an error for that
//! item (it indicates a dedup miss), not a silent clobber.
//!
//! Storage paths are built by the orchestrator from (source, sanitized item
//! id), so the pre-check and the dedup check agree by construction.

use crate::config::StorageConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use url::Url;

/// Durable object storage for validated assets
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Implementation name for logs
    fn name(&self) -> &str;

    /// Whether an object already occupies the path
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Store bytes at the path and return the public URL.
    ///
    /// Fails with [`Error::StorageCollision`] if the path is occupied.
    async fn upload(&self, bytes: &[u8], path: &str) -> Result<String>;
}

/// Filesystem-backed object store
#[derive(Debug)]
pub struct FsAssetStore {
    root: PathBuf,
    public_base_url: String,
}

impl FsAssetStore {
    /// Create a store rooted at the configured directory.
    ///
    /// Validates the public base URL up front so a bad deployment fails at
    /// construction, not on the first upload.
    pub fn new(config: &StorageConfig) -> Result<Self> {
        Url::parse(&config.public_base_url).map_err(|e| Error::Config {
            message: format!("invalid public base URL: {e}"),
            key: Some("storage.public_base_url".to_string()),
        })?;

        Ok(Self {
            root: config.asset_root.clone(),
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn object_path(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

#[async_trait]
impl AssetStore for FsAssetStore {
    fn name(&self) -> &str {
        "filesystem"
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.object_path(path))
            .await
            .map_err(|e| Error::Storage(format!("existence check failed for '{path}': {e}")))?)
    }

    async fn upload(&self, bytes: &[u8], path: &str) -> Result<String> {
        let full_path = self.object_path(path);

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Storage(format!("failed to create '{}': {e}", parent.display())))?;
        }

        // create_new refuses an existing file atomically, closing the race
        // between the exists pre-check and the write
        let open_result = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full_path)
            .await;

        let mut file = match open_result {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(Error::StorageCollision {
                    path: path.to_string(),
                });
            }
            Err(e) => {
                return Err(Error::Storage(format!(
                    "failed to open '{path}' for writing: {e}"
                )));
            }
        };

        use tokio::io::AsyncWriteExt;
        file.write_all(bytes)
            .await
            .map_err(|e| Error::Storage(format!("failed to write '{path}': {e}")))?;
        file.flush()
            .await
            .map_err(|e| Error::Storage(format!("failed to flush '{path}': {e}")))?;

        tracing::debug!(path = %path, bytes = bytes.len(), "stored asset");

        Ok(format!("{}/{}", self.public_base_url, path))
    }
}
