//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with proper user agent strings
//! - GET requests with bounded body size
//! - Retry logic for transient failures
//! - Redirect handling and scope checks on the final URL
//! - Error classification

use crate::config::{Config, UserAgentConfig};
use crate::crawler::extractor::{extract, ContentKind, ExtractError};
use crate::crawler::limiter::{RateLimiter, Unlimited};
use crate::retry::RetryPolicy;
use crate::state::PageState;
use crate::url::ScopePolicy;
use crate::ConfigError;
use reqwest::{header, redirect::Policy, Client, Response};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use url::Url;

/// Maximum redirect hops followed for one request
const MAX_REDIRECTS: usize = 10;

/// Page-level fetch failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("HTTP {0}")]
    Status(u16),

    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("redirect error: {0}")]
    Redirect(String),

    #[error("redirected out of scope to {0}")]
    RedirectOutOfScope(String),

    #[error("unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("failed to read body: {0}")]
    Body(String),
}

impl FetchError {
    /// Returns true for failures worth retrying (timeouts, connection problems, 5xx)
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Status(code) => *code >= 500,
            Self::Timeout | Self::Connect(_) | Self::Request(_) | Self::Body(_) => true,
            _ => false,
        }
    }

    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_redirect() {
            Self::Redirect(e.to_string())
        } else if e.is_connect() {
            Self::Connect(e.to_string())
        } else if e.is_body() || e.is_decode() {
            Self::Body(e.to_string())
        } else {
            Self::Request(e.to_string())
        }
    }
}

impl From<ExtractError> for FetchError {
    fn from(e: ExtractError) -> Self {
        match e {
            ExtractError::UnsupportedContentType(ct) => Self::UnsupportedContentType(ct),
        }
    }
}

/// Outcome of fetching and extracting one page
#[derive(Debug, Clone)]
pub struct PageResult {
    /// URL that was requested
    pub url: Url,
    /// URL after redirects, when a response was received
    pub final_url: Option<Url>,
    /// HTTP status of the last response
    pub status: Option<u16>,
    pub content_type: Option<String>,
    /// Raw body length in bytes (after truncation)
    pub byte_len: usize,
    pub title: Option<String>,
    pub text: String,
    pub links: Vec<Url>,
    /// Wall time including retries and throttling
    pub duration: Duration,
    /// Attempts made, including the first
    pub attempts: u32,
    pub error: Option<FetchError>,
}

impl PageResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Final page outcome
    pub fn state(&self) -> PageState {
        match &self.error {
            None => PageState::Processed,
            Some(e) => PageState::from_fetch_error(e),
        }
    }

    fn failed(url: &Url, error: FetchError, started: Instant, attempts: u32) -> Self {
        let status = match &error {
            FetchError::Status(code) => Some(*code),
            _ => None,
        };
        Self {
            url: url.clone(),
            final_url: None,
            status,
            content_type: None,
            byte_len: 0,
            title: None,
            text: String::new(),
            links: Vec::new(),
            duration: started.elapsed(),
            attempts,
            error: Some(error),
        }
    }
}

/// A successful response body before extraction
struct RawPage {
    final_url: Url,
    status: u16,
    content_type: Option<String>,
    body: Vec<u8>,
}

/// Builds an HTTP client with proper configuration
///
/// Redirects are followed by the client (up to 10 hops); the final URL is
/// checked against the crawl scope afterwards.
///
/// # Example
///
/// ```no_run
/// use site_index::config::Config;
/// use site_index::crawler::build_http_client;
///
/// let client = build_http_client(&Config::default()).unwrap();
/// ```
pub fn build_http_client(config: &Config) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent(&config.user_agent))
        .timeout(Duration::from_secs(config.crawler.request_timeout_secs))
        .connect_timeout(Duration::from_secs(config.crawler.connect_timeout_secs))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Formats the User-Agent header: `CrawlerName/Version (+ContactURL; ContactEmail)`
pub fn user_agent(config: &UserAgentConfig) -> String {
    config.header_value()
}

/// Fetches pages with retry, throttling and extraction
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    retry: RetryPolicy,
    limiter: Arc<dyn RateLimiter>,
    scope: Option<Arc<ScopePolicy>>,
    max_body_bytes: usize,
}

impl Fetcher {
    /// Creates a fetcher from configuration
    pub fn new(config: &Config) -> Result<Self, ConfigError> {
        let client =
            build_http_client(config).map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            retry: RetryPolicy::new(
                config.crawler.max_retries,
                Duration::from_millis(config.crawler.retry_base_delay_ms),
                Duration::from_millis(config.crawler.retry_max_delay_ms),
            ),
            limiter: Arc::new(Unlimited),
            scope: None,
            max_body_bytes: config.crawler.max_body_bytes,
        })
    }

    /// Uses the given limiter before every attempt
    pub fn with_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    /// Rejects responses whose final URL falls outside `scope`
    pub fn with_scope(mut self, scope: Arc<ScopePolicy>) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Fetches a URL and extracts its content
    ///
    /// # Retry Logic
    ///
    /// | Condition | Action |
    /// |-----------|--------|
    /// | HTTP 4xx | Immediate failure |
    /// | HTTP 5xx | Retry with backoff |
    /// | Timeout / connection error | Retry with backoff |
    /// | Redirect loop or chain > 10 | Immediate failure |
    /// | Redirect out of scope | Immediate failure |
    /// | Non-text Content-Type | Immediate failure |
    ///
    /// Failures never propagate: they are returned inside the [`PageResult`].
    pub async fn fetch(&self, url: &Url) -> PageResult {
        let started = Instant::now();
        let mut attempts = 0u32;

        let outcome = self
            .retry
            .run(
                url.as_str(),
                |_| {
                    attempts += 1;
                    self.attempt(url)
                },
                FetchError::is_transient,
            )
            .await;

        let raw = match outcome {
            Ok(raw) => raw,
            Err(e) => {
                tracing::debug!("Fetch failed for {} after {} attempt(s): {}", url, attempts, e);
                return PageResult::failed(url, e, started, attempts);
            }
        };

        let byte_len = raw.body.len();
        let extracted = extract(&raw.body, raw.content_type.as_deref(), &raw.final_url);

        match extracted {
            Ok(page) => PageResult {
                url: url.clone(),
                final_url: Some(raw.final_url),
                status: Some(raw.status),
                content_type: raw.content_type,
                byte_len,
                title: page.title,
                text: page.text,
                links: page.links,
                duration: started.elapsed(),
                attempts,
                error: None,
            },
            Err(e) => {
                let mut result = PageResult::failed(url, e.into(), started, attempts);
                result.final_url = Some(raw.final_url);
                result.status = Some(raw.status);
                result.content_type = raw.content_type;
                result.byte_len = byte_len;
                result
            }
        }
    }

    /// One GET attempt, including the throttle wait
    async fn attempt(&self, url: &Url) -> Result<RawPage, FetchError> {
        let wait = self.limiter.reserve(url);
        if !wait.is_zero() {
            tracing::trace!("Throttling {} for {:?}", url, wait);
            tokio::time::sleep(wait).await;
        }

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let final_url = response.url().clone();
        if let Some(scope) = &self.scope {
            if final_url != *url && !scope.check(&final_url).is_allowed() {
                return Err(FetchError::RedirectOutOfScope(final_url.to_string()));
            }
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        // Reject binary content before downloading it
        ContentKind::from_content_type(content_type.as_deref())?;

        let body = read_body(response, self.max_body_bytes).await?;

        Ok(RawPage {
            final_url,
            status: status.as_u16(),
            content_type,
            body,
        })
    }
}

/// Reads at most `limit` bytes of the body, dropping the rest
async fn read_body(mut response: Response, limit: usize) -> Result<Vec<u8>, FetchError> {
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(FetchError::from_reqwest)? {
        let room = limit.saturating_sub(body.len());
        if chunk.len() >= room {
            body.extend_from_slice(&chunk[..room]);
            tracing::debug!("Body of {} truncated at {} bytes", response.url(), limit);
            break;
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}
