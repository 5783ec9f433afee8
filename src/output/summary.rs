//! Crawl summary type
//!
//! The summary is assembled once, when the orchestrator finishes, and is the
//! only thing a crawl hands back to its caller.

use crate::state::PageState;
use std::collections::BTreeMap;
use std::time::Duration;

/// Upper bound on error messages kept in a summary
pub const MAX_RECORDED_ERRORS: usize = 100;

/// Result of one crawl
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlSummary {
    /// Normalized seed URL
    pub seed: String,

    /// Embedding provider identifier
    pub provider: String,

    /// Embedding model identifier
    pub model: String,

    /// Dispatched fetches that completed, successful or not
    pub pages_crawled: u64,

    /// Subset of `pages_crawled` that ended in an error state
    pub pages_failed: u64,

    /// Chunks produced from successfully extracted pages
    pub chunks_created: u64,

    /// Vectors newly written to the store
    pub embeddings_created: u64,

    /// Chunks whose batch failed after retries or whose write was rejected
    pub embeddings_failed: u64,

    /// Chunks already stored for this provider/model (or repeated within the crawl)
    pub chunks_unchanged: u64,

    /// Chunks never submitted because the crawl was cancelled
    pub embeddings_skipped: u64,

    /// Page outcomes
    pub page_states: BTreeMap<PageState, u64>,

    /// Pages crawled per link depth
    pub depth_breakdown: BTreeMap<u32, u64>,

    /// Wall time of the whole crawl
    pub elapsed: Duration,

    /// Non-fatal errors, oldest first, capped at [`MAX_RECORDED_ERRORS`]
    pub errors: Vec<String>,

    /// Errors dropped once the cap was reached
    pub errors_truncated: u64,

    /// True if the crawl stopped because of a cancellation request
    pub cancelled: bool,
}

impl CrawlSummary {
    /// Creates an empty summary for a crawl
    pub fn new(seed: impl Into<String>, provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            seed: seed.into(),
            provider: provider.into(),
            model: model.into(),
            ..Self::default()
        }
    }

    /// Pages that were fetched and extracted successfully
    pub fn pages_succeeded(&self) -> u64 {
        self.pages_crawled.saturating_sub(self.pages_failed)
    }

    /// Adds a non-fatal error message, respecting the cap
    pub fn push_error(&mut self, message: impl Into<String>) {
        if self.errors.len() < MAX_RECORDED_ERRORS {
            self.errors.push(message.into());
        } else {
            self.errors_truncated += 1;
        }
    }

    /// Calculates the page success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.pages_crawled == 0 {
            0.0
        } else {
            (self.pages_succeeded() as f64 / self.pages_crawled as f64) * 100.0
        }
    }

    /// Short human-readable description of the crawl
    pub fn describe(&self) -> String {
        let prefix = if self.cancelled {
            "Crawl cancelled: "
        } else {
            ""
        };

        if self.pages_succeeded() == 0 {
            return format!(
                "{}No content indexed from {} ({} page(s) attempted, {} failed)",
                prefix, self.seed, self.pages_crawled, self.pages_failed
            );
        }

        let mut text = format!(
            "{}Indexed {} page(s) from {} into {} chunk(s); {} new embedding(s) with {}/{}",
            prefix,
            self.pages_succeeded(),
            self.seed,
            self.chunks_created,
            self.embeddings_created,
            self.provider,
            self.model
        );
        if self.chunks_unchanged > 0 {
            text.push_str(&format!(", {} unchanged", self.chunks_unchanged));
        }
        if self.pages_failed > 0 {
            text.push_str(&format!(", {} page(s) failed", self.pages_failed));
        }
        if self.embeddings_failed > 0 {
            text.push_str(&format!(", {} embedding(s) failed", self.embeddings_failed));
        }
        text
    }
}
