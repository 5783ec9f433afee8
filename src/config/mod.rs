//! Configuration module for Site-Index
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, and turns external crawl requests into validated crawl jobs.
//!
//! # Example
//!
//! ```no_run
//! use site_index::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("site-index.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

use crate::embedding::ProviderKind;
use crate::url::normalize_url;
use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

// Re-export types
pub use types::{
    ChunkingConfig, Config, CrawlerConfig, DomainEntry, EmbeddingConfig, StoreConfig,
    UserAgentConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};

/// A crawl request as received from an API or CLI caller
///
/// Omitted fields fall back to the loaded configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlRequest {
    #[serde(alias = "url")]
    pub seed_url: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub max_pages: Option<u32>,
    #[serde(default)]
    pub same_domain: Option<bool>,
    #[serde(default)]
    pub persist_location: Option<String>,
}

impl CrawlRequest {
    /// Creates a request for the given seed with every other field defaulted
    pub fn new(seed_url: impl Into<String>) -> Self {
        Self {
            seed_url: seed_url.into(),
            ..Self::default()
        }
    }

    /// Validates the request and resolves defaults into an immutable job
    ///
    /// Fails with a configuration error for an invalid seed, an unknown
    /// provider or a zero page budget. No network activity happens here.
    pub fn into_job(self, config: &Config) -> Result<CrawlJob, ConfigError> {
        let seed = normalize_url(self.seed_url.trim()).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", self.seed_url, e))
        })?;

        let provider_name = self
            .provider
            .as_deref()
            .unwrap_or(config.embedding.provider.as_str());
        let provider = ProviderKind::parse(provider_name)?;

        let max_pages = self.max_pages.unwrap_or(config.crawler.max_pages);
        if max_pages < 1 {
            return Err(ConfigError::Validation(
                "max_pages must be >= 1".to_string(),
            ));
        }

        let store_path = self
            .persist_location
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| config.store.path.clone());

        Ok(CrawlJob {
            seed,
            same_domain: self.same_domain.unwrap_or(config.crawler.same_domain),
            max_pages,
            max_depth: config.crawler.max_depth,
            provider,
            store_path: PathBuf::from(store_path),
        })
    }
}

/// A validated crawl invocation
///
/// Built once per crawl and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlJob {
    /// Normalized seed URL
    pub seed: Url,
    /// Restrict the crawl to the seed's registrable domain
    pub same_domain: bool,
    /// Page budget
    pub max_pages: u32,
    /// Maximum link depth from the seed (seed is depth 0)
    pub max_depth: u32,
    /// Embedding backend
    pub provider: ProviderKind,
    /// Directory holding the vector store
    pub store_path: PathBuf,
}
