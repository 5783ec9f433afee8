//! Index statistics formatting
//!
//! This module renders store statistics and the crawl run history for the
//! `stats` command.

use crate::store::{RunRecord, StoreStats};
use std::fmt::Write;

/// Formats collection statistics
///
/// # Arguments
///
/// * `stats` - Statistics loaded from the store
pub fn format_store_stats(stats: &StoreStats) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== Index Statistics ===\n");
    let _ = writeln!(out, "Overview:");
    let _ = writeln!(out, "  Total chunks: {}", stats.total_chunks);
    let _ = writeln!(out, "  Distinct sources: {}", stats.distinct_sources);
    let _ = writeln!(out, "  Recorded crawls: {}", stats.runs);
    let _ = writeln!(out);

    if !stats.models.is_empty() {
        let _ = writeln!(out, "Chunks by Model:");
        for model in &stats.models {
            let share = if stats.total_chunks > 0 {
                (model.chunks as f64 / stats.total_chunks as f64) * 100.0
            } else {
                0.0
            };
            let _ = writeln!(
                out,
                "  {}/{}: {} ({:.1}%), {} dims",
                model.provider, model.model, model.chunks, share, model.dimension
            );
        }
        let _ = writeln!(out);
    }

    out
}

/// Formats recent crawl runs, newest first
pub fn format_run_history(runs: &[RunRecord]) -> String {
    let mut out = String::new();

    if runs.is_empty() {
        let _ = writeln!(out, "No crawls recorded.");
        return out;
    }

    let _ = writeln!(out, "Recent Crawls:");
    for run in runs {
        let duration = (run.finished_at - run.started_at).num_milliseconds() as f64 / 1000.0;
        let _ = writeln!(
            out,
            "  {} [{}] {} via {}/{}: {} pages ({} failed), {} chunks, {} new embeddings, {:.1}s",
            run.finished_at.format("%Y-%m-%d %H:%M:%S"),
            run.status.to_db_string(),
            run.seed,
            run.provider,
            run.model,
            run.pages_crawled,
            run.pages_failed,
            run.chunks_created,
            run.embeddings_created,
            duration
        );
    }

    out
}
