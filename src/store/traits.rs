//! Vector store trait and error types

use crate::chunk::Chunk;
use crate::embedding::{EmbeddingVector, ModelKey};
use crate::store::{RunRecord, ScoredChunk, StoreStats, UpsertOutcome};
use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store cannot be used at all; no further progress is possible
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A single write was rejected
    #[error("Write rejected: {0}")]
    Write(String),

    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Returns true when the store as a whole is unreachable
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Io(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match e.sqlite_error_code() {
            Some(
                ErrorCode::CannotOpen
                | ErrorCode::NotADatabase
                | ErrorCode::DatabaseCorrupt
                | ErrorCode::SystemIoFailure
                | ErrorCode::ReadOnly
                | ErrorCode::PermissionDenied
                | ErrorCode::DiskFull,
            ) => Self::Unavailable(e.to_string()),
            _ => Self::Sqlite(e),
        }
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Persistent chunk + vector storage
///
/// Entries are keyed by `(content hash, provider, model)`. Implementations
/// must be safe for concurrent callers.
pub trait VectorStore: Send + Sync {
    /// Stores a chunk with its vector
    ///
    /// Writing a key that already exists changes nothing and reports
    /// [`UpsertOutcome::Unchanged`].
    fn upsert(&self, chunk: &Chunk, vector: &EmbeddingVector) -> StoreResult<UpsertOutcome>;

    /// Checks whether a chunk hash is already stored for the given model
    fn contains(&self, hash: &str, key: &ModelKey) -> StoreResult<bool>;

    /// Returns up to `k` chunks most similar to `vector`, best first
    ///
    /// Only entries stored under `key` are considered.
    fn query_similar(&self, vector: &[f32], key: &ModelKey, k: usize)
        -> StoreResult<Vec<ScoredChunk>>;

    /// Collection statistics
    fn stats(&self) -> StoreResult<StoreStats>;

    /// Records a finished crawl run, returning its ID
    fn record_run(&self, run: &RunRecord) -> StoreResult<i64>;

    /// Most recent runs, newest first
    fn recent_runs(&self, limit: usize) -> StoreResult<Vec<RunRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_codes_are_fatal() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
            None,
        );
        let store_err = StoreError::from(err);
        assert!(store_err.is_fatal());
        assert!(matches!(store_err, StoreError::Unavailable(_)));
    }

    #[test]
    fn test_constraint_errors_are_not_fatal() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT),
            None,
        );
        assert!(!StoreError::from(err).is_fatal());
        assert!(!StoreError::Write("bad".to_string()).is_fatal());
    }
}
