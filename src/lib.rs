//! Site-Index: turn a website into a locally queryable semantic index
//!
//! This crate crawls pages within a scope, extracts and chunks their text,
//! embeds the chunks through a pluggable provider and persists chunks and
//! vectors in a local store that supports nearest-neighbor queries.

pub mod chunk;
pub mod config;
pub mod crawler;
pub mod embedding;
pub mod output;
pub mod retry;
pub mod search;
pub mod state;
pub mod store;
pub mod url;

use thiserror::Error;

/// Main error type for Site-Index operations
///
/// Only configuration problems and an unreachable store surface through this
/// type from a crawl; everything else is folded into the crawl summary.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("Embedding error: {0}")]
    Embedding(#[from] embedding::EmbeddingError),

    #[error("Store error: {0}")]
    Store(#[from] store::StoreError),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::CrawlPhase,
        to: state::CrawlPhase,
    },

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Worker task failed: {0}")]
    Worker(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),

    #[error("Unknown embedding provider '{0}' (expected openai, gemini, mistral or ollama)")]
    UnknownProvider(String),

    #[error("Missing API key for provider {provider}: set {env_var} or embedding.api-key")]
    MissingApiKey { provider: String, env_var: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Site-Index operations
pub type Result<T> = std::result::Result<T, IndexError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::{Config, CrawlJob, CrawlRequest};
pub use crawler::{crawl, run_crawl_request, Coordinator};
pub use embedding::{EmbeddingProvider, ProviderKind};
pub use output::{CrawlResponse, CrawlSummary};
pub use state::{CrawlPhase, PageState};
pub use store::{SqliteVectorStore, VectorStore};
pub use url::{normalize_url, registrable_domain, ScopePolicy};
