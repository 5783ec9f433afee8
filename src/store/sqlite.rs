//! SQLite vector store implementation

use crate::chunk::Chunk;
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob, EmbeddingVector, ModelKey};
use crate::store::schema::initialize_schema;
use crate::store::traits::{StoreError, StoreResult, VectorStore};
use crate::store::{ModelStats, RunRecord, RunStatus, ScoredChunk, StoreStats, UpsertOutcome};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// File created inside the persist directory
pub const DB_FILE_NAME: &str = "vectors.db";

/// SQLite-backed vector store
///
/// A single connection behind a mutex serializes writers, so the store can be
/// shared between tasks through an `Arc`.
pub struct SqliteVectorStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteVectorStore {
    /// Opens or creates the store inside `dir`
    ///
    /// # Arguments
    ///
    /// * `dir` - Persist directory; created if missing
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteVectorStore)` - Successfully opened/created database
    /// * `Err(StoreError)` - The directory or database is unusable
    pub fn open(dir: &Path) -> StoreResult<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(DB_FILE_NAME);
        let conn = Connection::open(&path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;
        conn.busy_timeout(Duration::from_secs(5))?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path),
        })
    }

    /// Creates an in-memory store
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// Path of the database file, `None` for in-memory stores
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("store lock poisoned".to_string()))
    }
}

impl VectorStore for SqliteVectorStore {
    fn upsert(&self, chunk: &Chunk, vector: &EmbeddingVector) -> StoreResult<UpsertOutcome> {
        if chunk.hash != vector.chunk_hash {
            return Err(StoreError::Write(format!(
                "vector for {} does not belong to chunk {}",
                vector.chunk_hash, chunk.hash
            )));
        }
        if vector.values.is_empty() || vector.values.len() != vector.dims {
            return Err(StoreError::Write(format!(
                "vector for chunk {} has {} values, expected {}",
                chunk.hash,
                vector.values.len(),
                vector.dims
            )));
        }

        let conn = self.lock()?;
        let changed = conn.execute(
            "INSERT INTO chunks (hash, provider, model, source_url, chunk_index, text,
                                 start_offset, end_offset, dims, vector, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
             ON CONFLICT(hash, provider, model) DO NOTHING",
            params![
                chunk.hash,
                vector.provider,
                vector.model,
                chunk.source_url,
                chunk.index as i64,
                chunk.text,
                chunk.start as i64,
                chunk.end as i64,
                vector.dims as i64,
                vec_to_blob(&vector.values),
                Utc::now().to_rfc3339(),
            ],
        )?;

        Ok(if changed > 0 {
            UpsertOutcome::Inserted
        } else {
            UpsertOutcome::Unchanged
        })
    }

    fn contains(&self, hash: &str, key: &ModelKey) -> StoreResult<bool> {
        let conn = self.lock()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM chunks WHERE hash = ?1 AND provider = ?2 AND model = ?3",
                params![hash, key.provider, key.model],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn query_similar(
        &self,
        vector: &[f32],
        key: &ModelKey,
        k: usize,
    ) -> StoreResult<Vec<ScoredChunk>> {
        if k == 0 || vector.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT hash, source_url, chunk_index, text, dims, vector
             FROM chunks WHERE provider = ?1 AND model = ?2",
        )?;

        let rows = stmt.query_map(params![key.provider, key.model], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, Vec<u8>>(5)?,
            ))
        })?;

        let mut scored = Vec::new();
        for row in rows {
            let (hash, source_url, chunk_index, text, dims, blob) = row?;
            if dims as usize != vector.len() {
                continue;
            }
            let stored = blob_to_vec(&blob);
            scored.push(ScoredChunk {
                hash,
                source_url,
                chunk_index: chunk_index as usize,
                text,
                score: cosine_similarity(vector, &stored),
            });
        }

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    fn stats(&self) -> StoreResult<StoreStats> {
        let conn = self.lock()?;

        let total_chunks: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        let distinct_sources: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT source_url) FROM chunks",
            [],
            |row| row.get(0),
        )?;
        let runs: i64 = conn.query_row("SELECT COUNT(*) FROM crawl_runs", [], |row| row.get(0))?;

        let mut stmt = conn.prepare(
            "SELECT provider, model, MAX(dims), COUNT(*) FROM chunks
             GROUP BY provider, model ORDER BY provider, model",
        )?;
        let models = stmt
            .query_map([], |row| {
                Ok(ModelStats {
                    provider: row.get(0)?,
                    model: row.get(1)?,
                    dimension: row.get::<_, i64>(2)? as usize,
                    chunks: row.get::<_, i64>(3)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(StoreStats {
            total_chunks: total_chunks as u64,
            distinct_sources: distinct_sources as u64,
            runs: runs as u64,
            models,
        })
    }

    fn record_run(&self, run: &RunRecord) -> StoreResult<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO crawl_runs (seed, provider, model, status, pages_crawled, pages_failed,
                                     chunks_created, embeddings_created, embeddings_failed,
                                     started_at, finished_at, config_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                run.seed,
                run.provider,
                run.model,
                run.status.to_db_string(),
                run.pages_crawled as i64,
                run.pages_failed as i64,
                run.chunks_created as i64,
                run.embeddings_created as i64,
                run.embeddings_failed as i64,
                run.started_at.to_rfc3339(),
                run.finished_at.to_rfc3339(),
                run.config_hash,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn recent_runs(&self, limit: usize) -> StoreResult<Vec<RunRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT seed, provider, model, status, pages_crawled, pages_failed, chunks_created,
                    embeddings_created, embeddings_failed, started_at, finished_at, config_hash
             FROM crawl_runs ORDER BY id DESC LIMIT ?1",
        )?;

        let runs = stmt
            .query_map(params![limit as i64], |row| {
                Ok(RunRecord {
                    seed: row.get(0)?,
                    provider: row.get(1)?,
                    model: row.get(2)?,
                    status: RunStatus::from_db_string(&row.get::<_, String>(3)?)
                        .unwrap_or(RunStatus::Completed),
                    pages_crawled: row.get::<_, i64>(4)? as u64,
                    pages_failed: row.get::<_, i64>(5)? as u64,
                    chunks_created: row.get::<_, i64>(6)? as u64,
                    embeddings_created: row.get::<_, i64>(7)? as u64,
                    embeddings_failed: row.get::<_, i64>(8)? as u64,
                    started_at: parse_timestamp(&row.get::<_, String>(9)?),
                    finished_at: parse_timestamp(&row.get::<_, String>(10)?),
                    config_hash: row.get(11)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(runs)
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}
