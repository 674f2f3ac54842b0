//! Content validation
//!
//! Downloads an asset from its resolved URL and verifies it before anything
//! downstream trusts it: HTTP success, non-zero length, the PDF magic header
//! for PDF assets, and a size cap. The body is consumed chunkwise so a bad
//! magic header or an oversize body aborts mid-stream instead of downloading
//! the remainder. Every failure becomes a structured outcome — a 5xx is a
//! retryable transport error, everything else is content-invalid and never
//! retried.

use crate::error::{Error, Result};
use crate::types::AssetFormat;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::time::Duration;

/// First bytes of every well-formed PDF
const PDF_MAGIC: &[u8] = b"%PDF-";

/// Upper bound on sanitized filename length
const MAX_FILENAME_LEN: usize = 96;

/// A downloaded asset that passed validation
#[derive(Clone, Debug)]
pub struct ValidatedAsset {
    /// Full asset body
    pub bytes: Vec<u8>,
    /// SHA-256 of the body, hex encoded
    pub sha256: String,
}

impl ValidatedAsset {
    /// Body length in bytes (always non-zero for a validated asset)
    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Never true for a validated asset; present for API completeness
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Downloads and verifies binary assets
#[derive(Clone)]
pub struct ContentValidator {
    client: reqwest::Client,
    max_asset_bytes: u64,
}

impl ContentValidator {
    /// Create a validator with the given size cap
    pub fn new(max_asset_bytes: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(Error::Network)?;

        Ok(Self {
            client,
            max_asset_bytes,
        })
    }

    /// Download an asset and verify it.
    ///
    /// `source_id` scopes transport errors to the provider for the retry
    /// policy and the statistics tracker.
    pub async fn fetch_validated(
        &self,
        source_id: &str,
        url: &str,
        format: AssetFormat,
    ) -> Result<ValidatedAsset> {
        tracing::debug!(source = source_id, url = %url, "downloading asset");

        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status.is_server_error() {
            return Err(Error::Source {
                source_id: source_id.to_string(),
                message: format!("asset download failed with {status}"),
            });
        }
        if !status.is_success() {
            return Err(Error::InvalidAsset(format!(
                "asset at {url} returned {status}"
            )));
        }

        let mut stream = response.bytes_stream();
        let mut body: Vec<u8> = Vec::new();
        let mut hasher = Sha256::new();
        let mut magic_verified = format != AssetFormat::Pdf;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            hasher.update(&chunk);
            body.extend_from_slice(&chunk);

            if body.len() as u64 > self.max_asset_bytes {
                return Err(Error::InvalidAsset(format!(
                    "asset exceeds size cap of {} bytes",
                    self.max_asset_bytes
                )));
            }

            if !magic_verified && body.len() >= PDF_MAGIC.len() {
                if !body.starts_with(PDF_MAGIC) {
                    return Err(Error::InvalidAsset(
                        "missing PDF magic header".to_string(),
                    ));
                }
                magic_verified = true;
            }
        }

        if body.is_empty() {
            return Err(Error::InvalidAsset("empty body".to_string()));
        }
        if !magic_verified {
            // Body ended before the magic header could even fit
            return Err(Error::InvalidAsset(
                "body too short for PDF header".to_string(),
            ));
        }

        let digest = hasher.finalize();
        let sha256: String = digest.iter().map(|b| format!("{b:02x}")).collect();

        Ok(ValidatedAsset {
            bytes: body,
            sha256,
        })
    }
}

/// Reduce an arbitrary string to a storage-safe filename.
///
/// The output contains only ASCII alphanumerics, hyphens, and underscores,
/// never contains a `..` sequence, and is at most [`MAX_FILENAME_LEN`] bytes —
/// safe to concatenate into a storage path with no further escaping. Runs of
/// disallowed characters collapse into a single hyphen; a string with nothing
/// salvageable becomes `"item"`.
pub fn sanitize_filename(input: &str) -> String {
    let mut out = String::with_capacity(input.len().min(MAX_FILENAME_LEN));
    let mut pending_separator = false;

    for c in input.chars() {
        if out.len() >= MAX_FILENAME_LEN {
            break;
        }
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            if pending_separator && !out.is_empty() {
                out.push('-');
                pending_separator = false;
                if out.len() >= MAX_FILENAME_LEN {
                    break;
                }
            } else {
                pending_separator = false;
            }
            out.push(c);
        } else {
            pending_separator = true;
        }
    }

    let trimmed = out.trim_matches(|c| c == '-' || c == '_');
    if trimmed.is_empty() {
        "item".to_string()
    } else {
        trimmed.to_string()
    }
}
