//! Output module for crawl summaries and reports
//!
//! This module handles:
//! - The crawl summary assembled by the orchestrator
//! - The response shape handed to API/CLI callers
//! - Markdown reports and index statistics

mod markdown;
pub mod stats;
mod summary;

pub use markdown::{format_markdown_summary, write_markdown_summary};
pub use stats::{format_run_history, format_store_stats};
pub use summary::{CrawlSummary, MAX_RECORDED_ERRORS};

use crate::IndexError;
use serde::{Deserialize, Serialize};

/// Crawl result as returned to an external caller
///
/// `success` is false only when the crawl could not run or had to abort
/// (configuration error, unreachable store). Partial failures are reported
/// through the counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlResponse {
    pub success: bool,
    pub pages_crawled: u64,
    pub pages_failed: u64,
    pub embeddings_created: u64,
    pub content_summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CrawlResponse {
    /// Builds the response for a finished or failed crawl
    pub fn from_outcome(outcome: Result<CrawlSummary, IndexError>) -> Self {
        match outcome {
            Ok(summary) => Self::from(&summary),
            Err(e) => Self::failure(e.to_string()),
        }
    }

    /// A response for a crawl that produced no summary
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            pages_crawled: 0,
            pages_failed: 0,
            embeddings_created: 0,
            content_summary: String::new(),
            error: Some(error.into()),
        }
    }
}

impl From<&CrawlSummary> for CrawlResponse {
    fn from(summary: &CrawlSummary) -> Self {
        Self {
            success: true,
            pages_crawled: summary.pages_crawled,
            pages_failed: summary.pages_failed,
            embeddings_created: summary.embeddings_created,
            content_summary: summary.describe(),
            error: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConfigError;

    #[test]
    fn test_response_from_summary() {
        let mut summary = CrawlSummary::new("https://example.com/", "openai", "m");
        summary.pages_crawled = 1;
        summary.pages_failed = 1;

        let response = CrawlResponse::from_outcome(Ok(summary));
        assert!(response.success);
        assert_eq!(response.pages_crawled, 1);
        assert_eq!(response.pages_failed, 1);
        assert_eq!(response.embeddings_created, 0);
        assert!(response.error.is_none());
        assert!(response.content_summary.starts_with("No content indexed"));
    }

    #[test]
    fn test_response_from_error() {
        let error = IndexError::Config(ConfigError::UnknownProvider("cohere".to_string()));
        let response = CrawlResponse::from_outcome(Err(error));

        assert!(!response.success);
        assert_eq!(response.pages_crawled, 0);
        assert!(response.error.unwrap().contains("cohere"));
    }

    #[test]
    fn test_response_from_store_failure() {
        let error: IndexError =
            crate::store::StoreError::Unavailable("read-only file system".to_string()).into();
        assert!(matches!(error, IndexError::Store(_)));

        let response = CrawlResponse::from_outcome(Err(error));
        assert!(!response.success);
        assert!(response.error.unwrap().contains("read-only file system"));
    }

    #[test]
    fn test_response_json_shape() {
        let response = CrawlResponse {
            success: true,
            pages_crawled: 6,
            pages_failed: 0,
            embeddings_created: 6,
            content_summary: "ok".to_string(),
            error: None,
        };
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["pages_crawled"], 6);
        assert_eq!(json["embeddings_created"], 6);
        assert_eq!(json["content_summary"], "ok");
        assert!(json.get("error").is_none());
    }
}
