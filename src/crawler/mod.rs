//! Crawler module for page fetching and indexing
//!
//! This module contains the core crawling logic, including:
//! - The frontier (BFS queue, visited set, scope and budget)
//! - HTTP fetching with retry logic and pluggable rate limiting
//! - Content extraction (text and links)
//! - Overall crawl coordination

mod coordinator;
mod extractor;
mod fetcher;
mod frontier;
mod limiter;

pub use coordinator::Coordinator;
pub use extractor::{extract, resolve_link, ContentKind, ExtractError, ExtractedPage};
pub use fetcher::{build_http_client, user_agent, FetchError, Fetcher, PageResult};
pub use frontier::{Frontier, FrontierEntry};
pub use limiter::{HostIntervalLimiter, RateLimiter, Unlimited};

use crate::config::{Config, CrawlJob, CrawlRequest};
use crate::output::{CrawlResponse, CrawlSummary};
use crate::IndexError;
use tokio_util::sync::CancellationToken;

/// Runs a complete crawl operation
///
/// This is the main entry point for a validated job. It will:
/// 1. Build the embedding backend and open the store (fail fast)
/// 2. Seed the frontier with the job's seed URL
/// 3. Fetch, extract and chunk pages with a pool of workers
/// 4. Embed chunks in batches and upsert them into the store
/// 5. Return the crawl summary
///
/// # Arguments
///
/// * `job` - The crawl job
/// * `config` - Crawler, chunking and embedding settings
/// * `cancel` - Cooperative cancellation signal
///
/// # Returns
///
/// * `Ok(CrawlSummary)` - Crawl finished (possibly with page or embedding failures)
/// * `Err(IndexError)` - Configuration error or unreachable store
pub async fn crawl(
    job: CrawlJob,
    config: &Config,
    cancel: CancellationToken,
) -> Result<CrawlSummary, IndexError> {
    Coordinator::new(job, config)?.run(cancel).await
}

/// Validates an external crawl request, runs it and shapes the response
///
/// Never fails: fatal errors are reported with `success = false`.
pub async fn run_crawl_request(
    request: CrawlRequest,
    config: &Config,
    cancel: CancellationToken,
) -> CrawlResponse {
    let outcome = match request.into_job(config) {
        Ok(job) => crawl(job, config, cancel).await,
        Err(e) => {
            tracing::error!("Rejected crawl request: {}", e);
            Err(IndexError::Config(e))
        }
    };
    CrawlResponse::from_outcome(outcome)
}
