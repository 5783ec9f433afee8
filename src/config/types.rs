use serde::Deserialize;

/// Main configuration structure for Site-Index
///
/// Every section has defaults so an empty file (or no file) is valid.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub store: StoreConfig,
    pub allow: Vec<DomainEntry>,
    pub deny: Vec<DomainEntry>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Maximum link depth from the seed URL
    pub max_depth: u32,

    /// Default page budget when a request does not carry one
    pub max_pages: u32,

    /// Default same-domain restriction when a request does not carry one
    pub same_domain: bool,

    /// Size of the fetch worker pool
    pub max_concurrent_fetches: u32,

    /// Whole-request timeout (seconds)
    pub request_timeout_secs: u64,

    /// Connection establishment timeout (seconds)
    pub connect_timeout_secs: u64,

    /// Retries after the first attempt for transient fetch failures
    pub max_retries: u32,

    /// First backoff delay (milliseconds), doubled per retry
    pub retry_base_delay_ms: u64,

    /// Upper bound for a single backoff delay (milliseconds)
    pub retry_max_delay_ms: u64,

    /// Minimum time between two requests to the same host (milliseconds, 0 disables)
    pub min_request_interval_ms: u64,

    /// Response bodies larger than this are truncated
    pub max_body_bytes: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: 5,
            max_pages: 10,
            same_domain: true,
            max_concurrent_fetches: 4,
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            max_retries: 3,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 8_000,
            min_request_interval_ms: 0,
            max_body_bytes: 5 * 1024 * 1024,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Name of the crawler
    pub crawler_name: String,

    /// Version of the crawler
    pub crawler_version: String,

    /// URL with information about the crawler
    pub contact_url: Option<String>,

    /// Email address for crawler-related contact
    pub contact_email: Option<String>,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "SiteIndex".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: None,
            contact_email: None,
        }
    }
}

impl UserAgentConfig {
    /// Formats the User-Agent header value: `Name/Version (+url; email)`
    pub fn header_value(&self) -> String {
        let contact: Vec<String> = self
            .contact_url
            .iter()
            .map(|url| format!("+{}", url))
            .chain(self.contact_email.iter().cloned())
            .collect();

        if contact.is_empty() {
            format!("{}/{}", self.crawler_name, self.crawler_version)
        } else {
            format!(
                "{}/{} ({})",
                self.crawler_name,
                self.crawler_version,
                contact.join("; ")
            )
        }
    }
}

/// Text chunking configuration (sizes are in characters)
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Embedding provider configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EmbeddingConfig {
    /// Provider identifier used when a request does not name one
    pub provider: String,

    /// Model override; each provider has its own default
    pub model: Option<String>,

    /// Base URL override (scheme + host, no trailing path)
    pub api_base: Option<String>,

    /// API key override; otherwise read from the provider's environment variable
    pub api_key: Option<String>,

    /// Expected vector dimension, enforced when set
    pub dimensions: Option<usize>,

    /// Texts per provider request
    pub batch_size: usize,

    /// Retries after the first attempt for a failing batch
    pub max_retries: u32,

    /// First backoff delay (milliseconds), doubled per retry
    pub retry_base_delay_ms: u64,

    /// Per-request timeout (seconds)
    pub timeout_secs: u64,

    /// Number of batches embedded concurrently
    pub concurrency: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: None,
            api_base: None,
            api_key: None,
            dimensions: None,
            batch_size: 32,
            max_retries: 3,
            retry_base_delay_ms: 1_000,
            timeout_secs: 60,
            concurrency: 2,
        }
    }
}

/// Vector store configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the vector database
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "./data/index".to_string(),
        }
    }
}

/// Domain entry for the allow and deny lists
#[derive(Debug, Clone, Deserialize)]
pub struct DomainEntry {
    /// Domain pattern (e.g., "example.com" or "*.example.com")
    pub domain: String,
}
