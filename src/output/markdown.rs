//! Markdown report generation
//!
//! This module generates a human-readable markdown report of a crawl,
//! including counts, page outcomes, the depth breakdown and recorded errors.

use crate::output::CrawlSummary;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Errors shown in the report before it is cut short
const REPORTED_ERRORS: usize = 20;

/// Writes a markdown report of a crawl to `output_path`
///
/// # Arguments
///
/// * `summary` - The crawl summary
/// * `output_path` - Path where the markdown file should be written
pub fn write_markdown_summary(summary: &CrawlSummary, output_path: &Path) -> std::io::Result<()> {
    let markdown = format_markdown_summary(summary);

    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a crawl summary as markdown
pub fn format_markdown_summary(summary: &CrawlSummary) -> String {
    let mut md = String::new();

    md.push_str("# Site Index Crawl Summary\n\n");

    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Seed**: {}\n", summary.seed));
    md.push_str(&format!(
        "- **Embedding**: {}/{}\n",
        summary.provider, summary.model
    ));
    md.push_str(&format!(
        "- **Duration**: {:.2} seconds\n",
        summary.elapsed.as_secs_f64()
    ));
    let status = if summary.cancelled {
        "cancelled"
    } else {
        "completed"
    };
    md.push_str(&format!("- **Status**: {}\n\n", status));

    md.push_str("## Overall Statistics\n\n");
    md.push_str("| Metric | Count |\n");
    md.push_str("|--------|-------|\n");
    md.push_str(&format!("| Pages crawled | {} |\n", summary.pages_crawled));
    md.push_str(&format!("| Pages failed | {} |\n", summary.pages_failed));
    md.push_str(&format!("| Chunks created | {} |\n", summary.chunks_created));
    md.push_str(&format!(
        "| Embeddings created | {} |\n",
        summary.embeddings_created
    ));
    md.push_str(&format!(
        "| Chunks unchanged | {} |\n",
        summary.chunks_unchanged
    ));
    md.push_str(&format!(
        "| Embeddings failed | {} |\n",
        summary.embeddings_failed
    ));
    md.push_str(&format!(
        "| Embeddings skipped | {} |\n\n",
        summary.embeddings_skipped
    ));
    md.push_str(&format!(
        "Success rate: {:.2}%\n\n",
        summary.success_rate()
    ));

    if !summary.page_states.is_empty() {
        md.push_str("## Page Outcomes\n\n");
        md.push_str("| State | Count |\n");
        md.push_str("|-------|-------|\n");
        for (state, count) in &summary.page_states {
            md.push_str(&format!("| {} | {} |\n", state, count));
        }
        md.push('\n');
    }

    if !summary.depth_breakdown.is_empty() {
        md.push_str("## Depth Breakdown\n\n");
        md.push_str("| Depth | Pages |\n");
        md.push_str("|-------|-------|\n");
        for (depth, count) in &summary.depth_breakdown {
            md.push_str(&format!("| {} | {} |\n", depth, count));
        }
        md.push('\n');
    }

    if !summary.errors.is_empty() {
        md.push_str("## Errors\n\n");
        for error in summary.errors.iter().take(REPORTED_ERRORS) {
            md.push_str(&format!("- {}\n", error));
        }
        let hidden = (summary.errors.len().saturating_sub(REPORTED_ERRORS)) as u64
            + summary.errors_truncated;
        if hidden > 0 {
            md.push_str(&format!("\n... and {} more\n", hidden));
        }
        md.push('\n');
    }

    md
}
