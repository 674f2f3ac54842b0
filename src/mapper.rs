//! Metadata normalization
//!
//! Pure mapping from provider-native [`RawItem`]s into [`CanonicalFields`].
//! Referential transparency matters here: the same input always yields the
//! same output, which is what makes repeated ingestion runs idempotent and
//! lets conformance tests exercise the mapper directly.

use crate::types::{CanonicalFields, RawItem};
use regex::Regex;
use std::sync::OnceLock;

/// Bounds for an acceptable publication year token
const YEAR_MIN: i32 = 1000;
const YEAR_MAX: i32 = 2999;

fn year_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // \b avoids matching the middle of longer digit runs (e.g. ISBN fragments)
    PATTERN.get_or_init(|| {
        Regex::new(r"\b(\d{4})\b").unwrap_or_else(|e| panic!("invalid year pattern: {e}"))
    })
}

/// Normalize a provider item into canonical fields.
///
/// - Multiple creator names are joined with `", "`; a single name passes
///   through unchanged; no names at all normalize to `"Unknown"` (the
///   canonical author column is NOT NULL).
/// - The year is the first 4-digit token in [1000, 2999] found in the
///   free-text date; no match yields `None`, never a guess.
/// - Missing or empty optional fields map to `None`, never to `""`, so
///   downstream equality checks stay simple.
pub fn normalize(item: &RawItem, source_id: &str) -> CanonicalFields {
    tracing::trace!(source = source_id, item_id = %item.id, "normalizing item");

    let author = {
        let names: Vec<&str> = item
            .creators
            .iter()
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .collect();
        if names.is_empty() {
            "Unknown".to_string()
        } else {
            names.join(", ")
        }
    };

    CanonicalFields {
        title: item.title.trim().to_string(),
        author,
        year: item.date.as_deref().and_then(extract_year),
        language: non_empty(item.language.as_deref()),
        description: non_empty(item.description.as_deref()),
    }
}

/// Extract the first plausible 4-digit year from free-form date text.
pub fn extract_year(date: &str) -> Option<i32> {
    for capture in year_pattern().captures_iter(date) {
        if let Ok(year) = capture[1].parse::<i32>() {
            if (YEAR_MIN..=YEAR_MAX).contains(&year) {
                return Some(year);
            }
        }
    }
    None
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
