//! Embedding providers
//!
//! Turns batches of chunk text into fixed-dimension vectors through one of a
//! closed set of backends, selected by [`ProviderKind`]:
//!
//! | Identifier (aliases) | Backend | Default model | Key variable |
//! |----------------------|---------|---------------|--------------|
//! | `openai` | [`OpenAiCompatible`] | `text-embedding-3-small` | `OPENAI_API_KEY` |
//! | `mistral` | [`OpenAiCompatible`] | `mistral-embed` | `MISTRAL_API_KEY` |
//! | `gemini` (`google`) | [`GeminiProvider`] | `text-embedding-004` | `GOOGLE_API_KEY` |
//! | `ollama` (`local`) | [`OllamaProvider`] | `llama3` | none |
//!
//! # Retry Strategy
//!
//! A single provider call never retries. [`BatchEmbedder`] wraps a provider
//! with a [`RetryPolicy`]:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - Network errors → retry
//! - Other HTTP 4xx and malformed responses → fail immediately

mod gemini;
mod ollama;
mod openai;

pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiCompatible;

use crate::config::EmbeddingConfig;
use crate::retry::RetryPolicy;
use crate::ConfigError;
use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Longest error body kept from a failed provider response
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Errors from a single embedding call
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("request to {provider} failed: {source}")]
    Http {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },

    #[error("invalid response from {provider}: {message}")]
    InvalidResponse {
        provider: &'static str,
        message: String,
    },

    #[error("expected {expected} vectors, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("expected dimension {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

impl EmbeddingError {
    /// Returns true for failures worth retrying (network, 429, 5xx)
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { source, .. } => !source.is_decode() && !source.is_builder(),
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Identifier of an embedding backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderKind {
    OpenAi,
    Gemini,
    Mistral,
    Ollama,
}

impl ProviderKind {
    /// Parses a provider identifier, accepting the documented aliases
    ///
    /// Unknown identifiers are a configuration error.
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "gemini" | "google" => Ok(Self::Gemini),
            "mistral" => Ok(Self::Mistral),
            "ollama" | "local" => Ok(Self::Ollama),
            _ => Err(ConfigError::UnknownProvider(name.to_string())),
        }
    }

    /// Canonical identifier, stored alongside every vector
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Gemini => "gemini",
            Self::Mistral => "mistral",
            Self::Ollama => "ollama",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            Self::OpenAi => "text-embedding-3-small",
            Self::Gemini => "text-embedding-004",
            Self::Mistral => "mistral-embed",
            Self::Ollama => "llama3",
        }
    }

    pub fn default_api_base(&self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com",
            Self::Gemini => "https://generativelanguage.googleapis.com",
            Self::Mistral => "https://api.mistral.ai",
            Self::Ollama => "http://localhost:11434",
        }
    }

    /// Environment variable holding the API key, if the backend needs one
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some("OPENAI_API_KEY"),
            Self::Gemini => Some("GOOGLE_API_KEY"),
            Self::Mistral => Some("MISTRAL_API_KEY"),
            Self::Ollama => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ProviderKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Provider + model pair that scopes stored vectors
///
/// Vectors under different keys are never compared with each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ModelKey {
    pub provider: String,
    pub model: String,
}

impl ModelKey {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

/// A vector bound to the chunk it was computed from
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingVector {
    pub chunk_hash: String,
    pub dims: usize,
    pub values: Vec<f32>,
    pub provider: String,
    pub model: String,
}

impl EmbeddingVector {
    pub fn new(chunk_hash: impl Into<String>, values: Vec<f32>, key: &ModelKey) -> Self {
        Self {
            chunk_hash: chunk_hash.into(),
            dims: values.len(),
            values,
            provider: key.provider.clone(),
            model: key.model.clone(),
        }
    }

    pub fn key(&self) -> ModelKey {
        ModelKey::new(self.provider.clone(), self.model.clone())
    }
}

/// Connection settings shared by every backend
#[derive(Debug, Clone)]
pub(crate) struct Endpoint {
    pub(crate) client: reqwest::Client,
    pub(crate) base: String,
    pub(crate) model: String,
    pub(crate) api_key: Option<String>,
}

/// A configured embedding backend
#[derive(Debug, Clone)]
pub enum EmbeddingProvider {
    OpenAi(OpenAiCompatible),
    Mistral(OpenAiCompatible),
    Gemini(GeminiProvider),
    Ollama(OllamaProvider),
}

impl EmbeddingProvider {
    /// Builds the backend for `kind`
    ///
    /// `model`, `api-base` and `api-key` from the configuration apply only
    /// when the configured provider is `kind`; otherwise the backend's
    /// defaults are used. The API key falls back to the provider's
    /// environment variable. A keyed backend without a key is a
    /// configuration error.
    pub fn from_config(kind: ProviderKind, config: &EmbeddingConfig) -> Result<Self, ConfigError> {
        let overrides_apply = ProviderKind::parse(&config.provider).ok() == Some(kind);

        let model = config
            .model
            .clone()
            .filter(|m| overrides_apply && !m.trim().is_empty())
            .unwrap_or_else(|| kind.default_model().to_string());

        let base = config
            .api_base
            .clone()
            .filter(|_| overrides_apply)
            .unwrap_or_else(|| kind.default_api_base().to_string())
            .trim_end_matches('/')
            .to_string();

        let api_key = match kind.api_key_env() {
            Some(env_var) => {
                let key = config
                    .api_key
                    .clone()
                    .filter(|_| overrides_apply)
                    .or_else(|| std::env::var(env_var).ok())
                    .filter(|k| !k.trim().is_empty())
                    .ok_or_else(|| ConfigError::MissingApiKey {
                        provider: kind.as_str().to_string(),
                        env_var: env_var.to_string(),
                    })?;
                Some(key)
            }
            None => None,
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        let endpoint = Endpoint {
            client,
            base,
            model,
            api_key,
        };

        Ok(match kind {
            ProviderKind::OpenAi => Self::OpenAi(OpenAiCompatible::new(kind, endpoint)),
            ProviderKind::Mistral => Self::Mistral(OpenAiCompatible::new(kind, endpoint)),
            ProviderKind::Gemini => Self::Gemini(GeminiProvider::new(endpoint)),
            ProviderKind::Ollama => Self::Ollama(OllamaProvider::new(endpoint)),
        })
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            Self::OpenAi(_) => ProviderKind::OpenAi,
            Self::Mistral(_) => ProviderKind::Mistral,
            Self::Gemini(_) => ProviderKind::Gemini,
            Self::Ollama(_) => ProviderKind::Ollama,
        }
    }

    pub fn provider_id(&self) -> &'static str {
        self.kind().as_str()
    }

    pub fn model(&self) -> &str {
        match self {
            Self::OpenAi(p) | Self::Mistral(p) => p.model(),
            Self::Gemini(p) => p.model(),
            Self::Ollama(p) => p.model(),
        }
    }

    pub fn key(&self) -> ModelKey {
        ModelKey::new(self.provider_id(), self.model())
    }

    /// Embeds a batch of texts with a single provider call
    ///
    /// Returns one vector per input, in input order. An empty batch makes no
    /// request.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = match self {
            Self::OpenAi(p) | Self::Mistral(p) => p.embed(texts).await?,
            Self::Gemini(p) => p.embed(texts).await?,
            Self::Ollama(p) => p.embed(texts).await?,
        };

        check_vectors(self.provider_id(), texts.len(), &vectors)?;
        Ok(vectors)
    }
}

/// Checks that a response holds one non-empty vector per input, all of the same dimension
fn check_vectors(
    provider: &'static str,
    expected: usize,
    vectors: &[Vec<f32>],
) -> Result<(), EmbeddingError> {
    if vectors.len() != expected {
        return Err(EmbeddingError::CountMismatch {
            expected,
            actual: vectors.len(),
        });
    }

    let dims = vectors.first().map(Vec::len).unwrap_or(0);
    if dims == 0 {
        return Err(EmbeddingError::InvalidResponse {
            provider,
            message: "empty embedding vector".to_string(),
        });
    }

    match vectors.iter().find(|v| v.len() != dims) {
        Some(odd) => Err(EmbeddingError::DimensionMismatch {
            expected: dims,
            actual: odd.len(),
        }),
        None => Ok(()),
    }
}

/// Sends a JSON POST and decodes a JSON response
pub(crate) async fn post_json<B, R>(
    provider: &'static str,
    request: reqwest::RequestBuilder,
    body: &B,
) -> Result<R, EmbeddingError>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let response = request
        .json(body)
        .send()
        .await
        .map_err(|source| EmbeddingError::Http { provider, source })?;

    let status = response.status();
    if !status.is_success() {
        let body_text = response.text().await.unwrap_or_default();
        return Err(EmbeddingError::Status {
            provider,
            status: status.as_u16(),
            body: body_text.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|source| EmbeddingError::Http { provider, source })?;

    serde_json::from_slice(&bytes).map_err(|e| EmbeddingError::InvalidResponse {
        provider,
        message: e.to_string(),
    })
}

/// A provider wrapped with batching limits, retry and dimension enforcement
#[derive(Debug, Clone)]
pub struct BatchEmbedder {
    provider: Arc<EmbeddingProvider>,
    retry: RetryPolicy,
    batch_size: usize,
    dimensions: Option<usize>,
}

impl BatchEmbedder {
    pub fn new(provider: EmbeddingProvider, config: &EmbeddingConfig) -> Self {
        let base = Duration::from_millis(config.retry_base_delay_ms);
        Self {
            provider: Arc::new(provider),
            retry: RetryPolicy::new(config.max_retries, base, base.saturating_mul(32)),
            batch_size: config.batch_size.max(1),
            dimensions: config.dimensions,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn provider(&self) -> &EmbeddingProvider {
        &self.provider
    }

    pub fn key(&self) -> ModelKey {
        self.provider.key()
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Embeds one batch, retrying transient failures
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let provider = &self.provider;
        let label = format!("{} batch of {}", provider.provider_id(), texts.len());
        let vectors = self
            .retry
            .run(
                &label,
                move |_| provider.embed(texts),
                EmbeddingError::is_transient,
            )
            .await?;

        if let (Some(expected), Some(first)) = (self.dimensions, vectors.first()) {
            if first.len() != expected {
                return Err(EmbeddingError::DimensionMismatch {
                    expected,
                    actual: first.len(),
                });
            }
        }

        Ok(vectors)
    }

    /// Embeds a single query text
    pub async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors.pop().ok_or(EmbeddingError::CountMismatch {
            expected: 1,
            actual: 0,
        })
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes)
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode a BLOB written by [`vec_to_blob`]
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`
///
/// Returns `0.0` for empty vectors, vectors of different lengths, or a
/// zero-length vector.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0f32, 0.0f32, 0.0f32), |(dot, na, nb), (x, y)| {
            (dot + x * y, na + x * x, nb + y * y)
        });

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}
