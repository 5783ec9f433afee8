//! Crawler coordinator - main crawl orchestration logic
//!
//! This module wires the pipeline together for one crawl job:
//! - A pool of fetch workers drains the shared frontier, extracts pages,
//!   re-offers discovered links and chunks the text
//! - A single embedding stage batches chunks, embeds them with bounded
//!   concurrency and upserts the vectors into the store
//! - Counts from both stages are folded into the final [`CrawlSummary`]
//!
//! The crawl runs the phases `Seeding → Draining → Finalizing → Done` exactly
//! once. Only an unreachable store aborts it; every other failure is counted.

use crate::chunk::{Chunk, Chunker};
use crate::config::{Config, CrawlJob};
use crate::crawler::fetcher::Fetcher;
use crate::crawler::frontier::{Frontier, FrontierEntry};
use crate::crawler::limiter::{HostIntervalLimiter, RateLimiter, Unlimited};
use crate::embedding::{BatchEmbedder, EmbeddingProvider, EmbeddingVector, ModelKey};
use crate::output::CrawlSummary;
use crate::state::{CrawlPhase, PageState, PhaseTracker};
use crate::store::{
    RunRecord, RunStatus, SqliteVectorStore, StoreError, UpsertOutcome, VectorStore,
};
use crate::url::ScopePolicy;
use crate::IndexError;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

/// Pages whose chunks may wait for the embedding stage
const PAGE_CHANNEL_CAPACITY: usize = 64;

/// Pages between progress log lines
const PROGRESS_INTERVAL: u64 = 10;

type SharedSummary = Arc<Mutex<CrawlSummary>>;

fn lock_summary(summary: &Mutex<CrawlSummary>) -> MutexGuard<'_, CrawlSummary> {
    summary
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Main crawler coordinator structure
pub struct Coordinator {
    job: CrawlJob,
    fetcher: Fetcher,
    frontier: Arc<Frontier>,
    chunker: Chunker,
    embedder: BatchEmbedder,
    store: Arc<dyn VectorStore>,
    workers: usize,
    embed_concurrency: usize,
    config_hash: Option<String>,
}

impl Coordinator {
    /// Creates a coordinator for one crawl job
    ///
    /// Everything that can fail for configuration reasons is checked here,
    /// before any page is fetched: the embedding backend (including its API
    /// key), the crawl scope, the HTTP client and the store location.
    ///
    /// # Arguments
    ///
    /// * `job` - The validated crawl job
    /// * `config` - Crawler, chunking and embedding settings
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Ready to run
    /// * `Err(IndexError)` - Configuration error or unreachable store
    pub fn new(job: CrawlJob, config: &Config) -> Result<Self, IndexError> {
        let provider = EmbeddingProvider::from_config(job.provider, &config.embedding)?;
        let embedder = BatchEmbedder::new(provider, &config.embedding);

        let scope = Arc::new(ScopePolicy::new(
            &job.seed,
            job.same_domain,
            config.allow.clone(),
            config.deny.clone(),
        )?);

        let limiter: Arc<dyn RateLimiter> = if config.crawler.min_request_interval_ms > 0 {
            Arc::new(HostIntervalLimiter::new(Duration::from_millis(
                config.crawler.min_request_interval_ms,
            )))
        } else {
            Arc::new(Unlimited)
        };

        let fetcher = Fetcher::new(config)?
            .with_scope(Arc::clone(&scope))
            .with_limiter(limiter);

        let store = SqliteVectorStore::open(&job.store_path)?;
        tracing::debug!("Opened vector store at {}", job.store_path.display());

        let frontier = Arc::new(Frontier::new(scope, job.max_depth, job.max_pages));

        let workers = (config.crawler.max_concurrent_fetches as usize)
            .min(job.max_pages as usize)
            .max(1);

        Ok(Self {
            job,
            fetcher,
            frontier,
            chunker: Chunker::from_config(&config.chunking),
            embedder,
            store: Arc::new(store),
            workers,
            embed_concurrency: config.embedding.concurrency.max(1),
            config_hash: None,
        })
    }

    /// Uses another store instead of the one at the job's location
    pub fn with_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.store = store;
        self
    }

    /// Records the configuration file hash with the crawl run
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = Some(hash.into());
        self
    }

    pub fn job(&self) -> &CrawlJob {
        &self.job
    }

    /// Runs the crawl to completion or cancellation
    ///
    /// Cancelling `cancel` stops workers between pages and skips embedding
    /// batches that have not started; the partial summary is still returned
    /// with `cancelled` set. An unreachable store stops the crawl and is
    /// returned as an error.
    pub async fn run(self, cancel: CancellationToken) -> Result<CrawlSummary, IndexError> {
        let start_time = Instant::now();
        let started_at = Utc::now();
        let key = self.embedder.key();
        let mut phase = PhaseTracker::new();

        tracing::info!(
            "Starting crawl of {} (max {} pages, max depth {}, same domain: {}, embedding: {})",
            self.job.seed,
            self.job.max_pages,
            self.job.max_depth,
            self.job.same_domain,
            key
        );

        // Store failures trip this token; user cancellation propagates into it
        let abort = cancel.child_token();
        let summary: SharedSummary = Arc::new(Mutex::new(CrawlSummary::new(
            self.job.seed.as_str(),
            key.provider.clone(),
            key.model.clone(),
        )));

        self.frontier.offer(&self.job.seed, 0, None);

        let (tx, rx) = mpsc::channel::<Vec<Chunk>>(PAGE_CHANNEL_CAPACITY);
        let stage = EmbedStage {
            embedder: self.embedder.clone(),
            store: Arc::clone(&self.store),
            summary: Arc::clone(&summary),
            key: key.clone(),
            cancel: abort.clone(),
        };
        let embed_handle = tokio::spawn(stage.run(rx, self.embed_concurrency));

        if abort.is_cancelled() || self.frontier.is_empty() {
            drop(tx);
        } else {
            phase.advance(CrawlPhase::Draining)?;

            let context = Arc::new(WorkerContext {
                fetcher: self.fetcher.clone(),
                frontier: Arc::clone(&self.frontier),
                chunker: self.chunker,
                summary: Arc::clone(&summary),
                start_time,
            });

            let mut workers = JoinSet::new();
            for id in 0..self.workers {
                workers.spawn(worker_loop(
                    id,
                    Arc::clone(&context),
                    tx.clone(),
                    abort.clone(),
                ));
            }
            drop(tx);

            while let Some(joined) = workers.join_next().await {
                if let Err(e) = joined {
                    tracing::error!("Fetch worker failed: {}", e);
                    lock_summary(&summary).push_error(format!("fetch worker failed: {}", e));
                }
            }
        }

        if abort.is_cancelled() {
            self.frontier.close();
        }

        phase.advance(CrawlPhase::Finalizing)?;
        tracing::debug!("Flushing outstanding embedding batches");

        let stage_result = embed_handle
            .await
            .map_err(|e| IndexError::Worker(format!("embedding stage failed: {}", e)))?;
        if let Err(e) = stage_result {
            tracing::error!("Crawl aborted, store unavailable: {}", e);
            return Err(IndexError::Store(e));
        }

        phase.advance(CrawlPhase::Done)?;

        let mut result = std::mem::take(&mut *lock_summary(&summary));
        result.elapsed = start_time.elapsed();
        result.cancelled = cancel.is_cancelled();

        let record = RunRecord {
            seed: result.seed.clone(),
            provider: result.provider.clone(),
            model: result.model.clone(),
            status: if result.cancelled {
                RunStatus::Cancelled
            } else {
                RunStatus::Completed
            },
            pages_crawled: result.pages_crawled,
            pages_failed: result.pages_failed,
            chunks_created: result.chunks_created,
            embeddings_created: result.embeddings_created,
            embeddings_failed: result.embeddings_failed,
            started_at,
            finished_at: Utc::now(),
            config_hash: self.config_hash.clone(),
        };
        if let Err(e) = self.store.record_run(&record) {
            tracing::warn!("Failed to record crawl run: {}", e);
        }

        tracing::info!(
            "Crawl {}: {} pages crawled ({} failed), {} chunks, {} new embeddings in {:?}",
            if result.cancelled { "cancelled" } else { "completed" },
            result.pages_crawled,
            result.pages_failed,
            result.chunks_created,
            result.embeddings_created,
            result.elapsed
        );

        Ok(result)
    }
}

/// State shared by the fetch workers
struct WorkerContext {
    fetcher: Fetcher,
    frontier: Arc<Frontier>,
    chunker: Chunker,
    summary: SharedSummary,
    start_time: Instant,
}

/// Marks a dispatched frontier entry finished, even if processing panics
struct InFlight<'a>(&'a Frontier);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.complete();
    }
}

async fn worker_loop(
    id: usize,
    context: Arc<WorkerContext>,
    tx: mpsc::Sender<Vec<Chunk>>,
    cancel: CancellationToken,
) {
    loop {
        let entry = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::debug!("Worker {} stopping: crawl cancelled", id);
                context.frontier.close();
                break;
            }
            next = context.frontier.next() => match next {
                Some(entry) => entry,
                None => break,
            },
        };

        let _in_flight = InFlight(&context.frontier);
        context.process(entry, &tx).await;
    }
}

impl WorkerContext {
    /// Fetches one page, re-offers its links and hands its chunks to the embedding stage
    async fn process(&self, entry: FrontierEntry, tx: &mpsc::Sender<Vec<Chunk>>) {
        tracing::debug!("Fetching {} (depth {})", entry.url, entry.depth);
        let result = self.fetcher.fetch(&entry.url).await;

        let duplicate = result.error.is_none()
            && result
                .final_url
                .as_ref()
                .is_some_and(|final_url| !self.frontier.claim_redirect(&entry.url, final_url));

        let chunks = match &result.error {
            Some(error) => {
                tracing::debug!("Page {} failed: {}", entry.url, error);
                Vec::new()
            }
            None if duplicate => {
                tracing::debug!(
                    "Skipping {}: redirects to already crawled {}",
                    entry.url,
                    result.final_url.as_ref().unwrap_or(&result.url)
                );
                Vec::new()
            }
            None => {
                let mut discovered = 0;
                for link in &result.links {
                    if self.frontier.offer(link, entry.depth + 1, Some(&entry.url)) {
                        discovered += 1;
                    }
                }

                let source = result.final_url.as_ref().unwrap_or(&result.url);
                let chunks = self.chunker.chunk(source.as_str(), &result.text);
                tracing::debug!(
                    "Processed {}: {} bytes, {} chunks, {} new links",
                    source,
                    result.byte_len,
                    chunks.len(),
                    discovered
                );
                chunks
            }
        };

        let pages_crawled = {
            let mut summary = lock_summary(&self.summary);
            summary.pages_crawled += 1;
            let state = if duplicate {
                PageState::DuplicateRedirect
            } else {
                result.state()
            };
            *summary.page_states.entry(state).or_insert(0) += 1;
            *summary.depth_breakdown.entry(entry.depth).or_insert(0) += 1;
            if let Some(error) = &result.error {
                summary.pages_failed += 1;
                summary.push_error(format!("{}: {}", entry.url, error));
            }
            summary.chunks_created += chunks.len() as u64;
            summary.pages_crawled
        };

        // Progress reporting every 10 pages
        if pages_crawled % PROGRESS_INTERVAL == 0 {
            let rate = pages_crawled as f64 / self.start_time.elapsed().as_secs_f64();
            tracing::info!(
                "Progress: {} pages crawled, {} in frontier, {:.2} pages/sec",
                pages_crawled,
                self.frontier.len(),
                rate
            );
        }

        if !chunks.is_empty() && tx.send(chunks).await.is_err() {
            tracing::warn!("Embedding stage stopped, dropping chunks of {}", entry.url);
        }
    }
}

/// Batches chunks, embeds them and writes the vectors
struct EmbedStage {
    embedder: BatchEmbedder,
    store: Arc<dyn VectorStore>,
    summary: SharedSummary,
    key: ModelKey,
    cancel: CancellationToken,
}

impl EmbedStage {
    /// Consumes page chunks until every worker has finished, then flushes
    ///
    /// Returns an error only when the store became unreachable.
    async fn run(
        self,
        mut rx: mpsc::Receiver<Vec<Chunk>>,
        concurrency: usize,
    ) -> Result<(), StoreError> {
        let stage = Arc::new(self);
        let batch_size = stage.embedder.batch_size();
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut batches: JoinSet<Result<(), StoreError>> = JoinSet::new();
        let mut seen = HashSet::new();
        let mut pending: Vec<Chunk> = Vec::with_capacity(batch_size);
        let mut fatal: Option<StoreError> = None;

        while let Some(chunks) = rx.recv().await {
            for chunk in chunks {
                if stage.cancel.is_cancelled() {
                    lock_summary(&stage.summary).embeddings_skipped += 1;
                    continue;
                }

                // Identical text on another page of this crawl
                if !seen.insert(chunk.hash.clone()) {
                    lock_summary(&stage.summary).chunks_unchanged += 1;
                    continue;
                }

                match stage.store.contains(&chunk.hash, &stage.key) {
                    Ok(true) => {
                        lock_summary(&stage.summary).chunks_unchanged += 1;
                        continue;
                    }
                    Ok(false) => {}
                    Err(e) if e.is_fatal() => {
                        tracing::error!("Store unavailable: {}", e);
                        fatal.get_or_insert(e);
                        stage.cancel.cancel();
                        lock_summary(&stage.summary).embeddings_skipped += 1;
                        continue;
                    }
                    Err(e) => tracing::warn!("Store lookup for {} failed: {}", chunk.hash, e),
                }

                pending.push(chunk);
                if pending.len() >= batch_size {
                    let batch = std::mem::replace(&mut pending, Vec::with_capacity(batch_size));
                    Self::dispatch(&stage, &semaphore, &mut batches, batch).await;
                }
            }

            while let Some(joined) = batches.try_join_next() {
                stage.settle(joined, &mut fatal);
            }
        }

        if !pending.is_empty() {
            Self::dispatch(&stage, &semaphore, &mut batches, pending).await;
        }

        while let Some(joined) = batches.join_next().await {
            stage.settle(joined, &mut fatal);
        }

        match fatal {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Records the outcome of a finished batch task
    fn settle(
        &self,
        joined: Result<Result<(), StoreError>, JoinError>,
        fatal: &mut Option<StoreError>,
    ) {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                if fatal.is_none() {
                    tracing::error!("Store unavailable: {}", e);
                    *fatal = Some(e);
                }
            }
            Err(e) => {
                tracing::error!("Embedding batch task failed: {}", e);
                lock_summary(&self.summary).push_error(format!("embedding batch task failed: {}", e));
            }
        }
    }

    /// Starts a batch once a concurrency slot is free
    async fn dispatch(
        stage: &Arc<Self>,
        semaphore: &Arc<Semaphore>,
        batches: &mut JoinSet<Result<(), StoreError>>,
        batch: Vec<Chunk>,
    ) {
        let permit = match Arc::clone(semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };
        let stage = Arc::clone(stage);
        batches.spawn(async move {
            let outcome = stage.embed_and_store(batch).await;
            drop(permit);
            outcome
        });
    }

    async fn embed_and_store(&self, batch: Vec<Chunk>) -> Result<(), StoreError> {
        let count = batch.len() as u64;

        if self.cancel.is_cancelled() {
            lock_summary(&self.summary).embeddings_skipped += count;
            return Ok(());
        }

        let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = match self.embedder.embed_batch(&texts).await {
            Ok(vectors) => vectors,
            Err(e) => {
                tracing::warn!("Embedding batch of {} chunks failed: {}", count, e);
                let mut summary = lock_summary(&self.summary);
                summary.embeddings_failed += count;
                summary.push_error(format!("embedding batch of {} chunk(s): {}", count, e));
                return Ok(());
            }
        };

        let mut created = 0u64;
        let mut unchanged = 0u64;
        let mut failed = Vec::new();
        let mut outcome = Ok(());

        for (chunk, values) in batch.iter().zip(vectors) {
            let vector = EmbeddingVector::new(chunk.hash.clone(), values, &self.key);
            match self.store.upsert(chunk, &vector) {
                Ok(UpsertOutcome::Inserted) => created += 1,
                Ok(UpsertOutcome::Unchanged) => unchanged += 1,
                Err(e) if e.is_fatal() => {
                    self.cancel.cancel();
                    outcome = Err(e);
                    break;
                }
                Err(e) => {
                    tracing::warn!("Failed to store chunk {} of {}: {}", chunk.index, chunk.source_url, e);
                    failed.push(format!("store chunk {} of {}: {}", chunk.index, chunk.source_url, e));
                }
            }
        }

        tracing::debug!(
            "Stored batch of {}: {} new, {} unchanged, {} failed",
            count,
            created,
            unchanged,
            failed.len()
        );

        let mut summary = lock_summary(&self.summary);
        summary.embeddings_created += created;
        summary.chunks_unchanged += unchanged;
        summary.embeddings_failed += failed.len() as u64;
        for message in failed {
            summary.push_error(message);
        }

        outcome
    }
}
