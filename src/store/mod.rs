//! Vector store for chunks and their embeddings
//!
//! This module handles persistence of the semantic index, including:
//! - SQLite database initialization and schema management
//! - Idempotent chunk + vector upserts keyed by content hash and model
//! - Brute-force cosine nearest-neighbor queries
//! - Collection statistics and crawl run history

mod schema;
mod sqlite;
mod traits;

pub use crate::embedding::ModelKey;
pub use schema::{get_schema_version, SCHEMA_VERSION};
pub use sqlite::{SqliteVectorStore, DB_FILE_NAME};
pub use traits::{StoreError, StoreResult, VectorStore};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

/// Opens (creating if needed) the store in the given directory
pub fn open_store(dir: &Path) -> StoreResult<SqliteVectorStore> {
    SqliteVectorStore::open(dir)
}

/// Result of an upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A new entry was written
    Inserted,
    /// The key already existed; nothing changed
    Unchanged,
}

/// A stored chunk returned by a similarity query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub hash: String,
    pub source_url: String,
    pub chunk_index: usize,
    pub text: String,
    /// Cosine similarity to the query vector
    pub score: f32,
}

/// Per provider/model counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelStats {
    pub provider: String,
    pub model: String,
    pub dimension: usize,
    pub chunks: u64,
}

/// Collection statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total_chunks: u64,
    pub distinct_sources: u64,
    pub runs: u64,
    pub models: Vec<ModelStats>,
}

/// Status of a recorded crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RunStatus {
    Completed,
    Cancelled,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// A finished crawl as recorded in the store
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunRecord {
    pub seed: String,
    pub provider: String,
    pub model: String,
    pub status: RunStatus,
    pub pages_crawled: u64,
    pub pages_failed: u64,
    pub chunks_created: u64,
    pub embeddings_created: u64,
    pub embeddings_failed: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub config_hash: Option<String>,
}
