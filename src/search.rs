//! Nearest-neighbor search over a built index
//!
//! The query text is embedded with the same provider and model that indexed
//! the pages; only vectors stored under that provider/model are compared.

use crate::config::Config;
use crate::embedding::{BatchEmbedder, EmbeddingProvider, ProviderKind};
use crate::store::{ScoredChunk, SqliteVectorStore, VectorStore};
use crate::IndexError;
use std::path::Path;

/// Returns the `k` stored chunks most similar to `query`
///
/// # Arguments
///
/// * `config` - Embedding settings used to build the provider
/// * `provider` - Backend the index was built with
/// * `store_path` - Directory holding the vector store
/// * `query` - Free-text query
/// * `k` - Number of results (at least 1)
pub async fn search_index(
    config: &Config,
    provider: ProviderKind,
    store_path: &Path,
    query: &str,
    k: usize,
) -> Result<Vec<ScoredChunk>, IndexError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(IndexError::InvalidQuery("query text is empty".to_string()));
    }
    if k == 0 {
        return Err(IndexError::InvalidQuery("k must be >= 1".to_string()));
    }

    let embedder = BatchEmbedder::new(
        EmbeddingProvider::from_config(provider, &config.embedding)?,
        &config.embedding,
    );
    let store = SqliteVectorStore::open(store_path)?;

    search_store(&embedder, &store, query, k).await
}

/// Embeds `query` and looks it up in an already opened store
pub async fn search_store(
    embedder: &BatchEmbedder,
    store: &dyn VectorStore,
    query: &str,
    k: usize,
) -> Result<Vec<ScoredChunk>, IndexError> {
    let vector = embedder.embed_query(query).await?;
    let key = embedder.key();
    tracing::debug!("Querying {} for top {} matches", key, k);

    Ok(store.query_similar(&vector, &key, k)?)
}
