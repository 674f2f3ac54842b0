//! Allow/deny filter gates
//!
//! Two independent gates run after classification: genre (case-sensitive
//! exact intersection with a fixed taxonomy) and author (case-insensitive
//! substring). Each gate is evaluated only when its flag is enabled, and an
//! enabled gate with an empty allow-list allows everything — fail-open, so a
//! half-finished configuration can never black out ingestion. When both gates
//! are enabled an item must pass both.
//!
//! Rejections are normal outcomes, not errors: the orchestrator counts them
//! as skipped and records each one in the filter-decision audit trail.

use crate::config::FilterConfig;

/// Verdict for one item
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilterVerdict {
    /// The item passes every enabled gate
    Pass,
    /// The item was rejected by a gate
    Reject {
        /// Which gate rejected it ("genre" / "author")
        filter: &'static str,
        /// Why, including the offending field value
        reason: String,
    },
}

/// Evaluates the configured gates against classified items
#[derive(Clone)]
pub struct FilterEngine {
    config: FilterConfig,
}

impl FilterEngine {
    /// Create an engine from the filter configuration
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    /// Evaluate both gates for an item. Gates are ANDed; the first rejection
    /// wins and names its gate.
    pub fn evaluate(&self, author: &str, genres: &[String]) -> FilterVerdict {
        if let Some(verdict) = self.genre_gate(genres) {
            return verdict;
        }
        if let Some(verdict) = self.author_gate(author) {
            return verdict;
        }
        FilterVerdict::Pass
    }

    /// Genre gate: the item's assigned genre set must intersect the
    /// allow-list. Case-sensitive exact match against the taxonomy.
    fn genre_gate(&self, genres: &[String]) -> Option<FilterVerdict> {
        if !self.config.enable_genre_filter || self.config.allowed_genres.is_empty() {
            return None;
        }

        let passes = genres
            .iter()
            .any(|g| self.config.allowed_genres.iter().any(|a| a == g));

        if passes {
            None
        } else {
            Some(FilterVerdict::Reject {
                filter: "genre",
                reason: format!(
                    "genres [{}] do not intersect allow-list",
                    genres.join(", ")
                ),
            })
        }
    }

    /// Author gate: some allow-list entry must be a case-insensitive
    /// substring of the item's author string.
    fn author_gate(&self, author: &str) -> Option<FilterVerdict> {
        if !self.config.enable_author_filter || self.config.allowed_authors.is_empty() {
            return None;
        }

        let author_lower = author.to_lowercase();
        let passes = self
            .config
            .allowed_authors
            .iter()
            .any(|a| author_lower.contains(&a.to_lowercase()));

        if passes {
            None
        } else {
            Some(FilterVerdict::Reject {
                filter: "author",
                reason: format!("author '{author}' does not match allow-list"),
            })
        }
    }
}
