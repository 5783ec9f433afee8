//! Site-Index main entry point
//!
//! This is the command-line interface for building and querying a semantic
//! index of a website.

use anyhow::Context;
use clap::{Parser, Subcommand};
use site_index::config::{load_config_with_hash, Config, CrawlRequest};
use site_index::crawler::Coordinator;
use site_index::output::{
    format_run_history, format_store_stats, write_markdown_summary, CrawlResponse,
};
use site_index::search::search_index;
use site_index::store::{SqliteVectorStore, VectorStore};
use site_index::ProviderKind;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Site-Index: turn a website into a locally queryable semantic index
///
/// Site-Index crawls pages within a scope, chunks their text, embeds the
/// chunks with a configurable provider and stores the vectors locally for
/// nearest-neighbor search.
#[derive(Parser, Debug)]
#[command(name = "site-index")]
#[command(version)]
#[command(about = "Crawl a website into a local semantic index", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults are used when omitted)
    #[arg(short, long, value_name = "CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl a site and index its content
    Crawl {
        /// Seed URL
        url: String,

        /// Embedding provider (openai, gemini, mistral, ollama)
        #[arg(long)]
        provider: Option<String>,

        /// Maximum number of pages to fetch
        #[arg(long)]
        max_pages: Option<u32>,

        /// Restrict the crawl to the seed's registrable domain
        #[arg(long)]
        same_domain: Option<bool>,

        /// Directory of the vector store
        #[arg(long, value_name = "PATH")]
        store: Option<String>,

        /// Print the crawl response as JSON
        #[arg(long)]
        json: bool,

        /// Write a markdown report of the crawl
        #[arg(long, value_name = "PATH")]
        report: Option<PathBuf>,
    },

    /// Search the index
    Query {
        /// Query text
        text: String,

        /// Number of results
        #[arg(short, default_value_t = 5)]
        k: usize,

        /// Embedding provider the index was built with
        #[arg(long)]
        provider: Option<String>,

        /// Directory of the vector store
        #[arg(long, value_name = "PATH")]
        store: Option<PathBuf>,
    },

    /// Show index statistics and recent crawls
    Stats {
        /// Directory of the vector store
        #[arg(long, value_name = "PATH")]
        store: Option<PathBuf>,
    },

    /// Validate configuration and show the effective settings
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let (config, config_hash) = load(cli.config.as_deref())?;

    match cli.command {
        Command::Crawl {
            url,
            provider,
            max_pages,
            same_domain,
            store,
            json,
            report,
        } => {
            let request = CrawlRequest {
                seed_url: url,
                provider,
                max_pages,
                same_domain,
                persist_location: store,
            };
            handle_crawl(request, &config, config_hash, json, report.as_deref()).await
        }
        Command::Query {
            text,
            k,
            provider,
            store,
        } => handle_query(&config, &text, k, provider.as_deref(), store).await,
        Command::Stats { store } => handle_stats(&config, store),
        Command::Check => handle_check(&config, config_hash.as_deref()),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("site_index=info,warn"),
            1 => EnvFilter::new("site_index=debug,info"),
            2 => EnvFilter::new("site_index=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Loads the configuration file, or the defaults when none is given
fn load(path: Option<&Path>) -> anyhow::Result<(Config, Option<String>)> {
    match path {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            Ok((config, Some(hash)))
        }
        None => {
            tracing::debug!("No configuration file given, using defaults");
            Ok((Config::default(), None))
        }
    }
}

fn store_dir(config: &Config, store: Option<PathBuf>) -> PathBuf {
    store.unwrap_or_else(|| PathBuf::from(&config.store.path))
}

/// Handles the crawl command
async fn handle_crawl(
    request: CrawlRequest,
    config: &Config,
    config_hash: Option<String>,
    json: bool,
    report: Option<&Path>,
) -> anyhow::Result<()> {
    let outcome = match request.into_job(config) {
        Ok(job) => match Coordinator::new(job, config) {
            Ok(coordinator) => {
                let coordinator = match config_hash {
                    Some(hash) => coordinator.with_config_hash(hash),
                    None => coordinator,
                };

                let cancel = CancellationToken::new();
                let on_interrupt = cancel.clone();
                tokio::spawn(async move {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        tracing::warn!("Interrupt received, finishing in-flight work");
                        on_interrupt.cancel();
                    }
                });

                coordinator.run(cancel).await
            }
            Err(e) => Err(e),
        },
        Err(e) => Err(e.into()),
    };

    if let (Ok(summary), Some(path)) = (&outcome, report) {
        write_markdown_summary(summary, path)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        tracing::info!("Report written to {}", path.display());
    }

    let response = CrawlResponse::from_outcome(outcome);
    if json {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else if response.success {
        println!("{}", response.content_summary);
    }

    match response.error {
        Some(error) => anyhow::bail!("crawl failed: {}", error),
        None => Ok(()),
    }
}

/// Handles the query command
async fn handle_query(
    config: &Config,
    text: &str,
    k: usize,
    provider: Option<&str>,
    store: Option<PathBuf>,
) -> anyhow::Result<()> {
    let provider = ProviderKind::parse(provider.unwrap_or(&config.embedding.provider))?;
    let dir = store_dir(config, store);

    let results = search_index(config, provider, &dir, text, k).await?;
    if results.is_empty() {
        println!("No matches in {}", dir.display());
        return Ok(());
    }

    for (rank, hit) in results.iter().enumerate() {
        println!(
            "{}. [{:.3}] {} (chunk {})",
            rank + 1,
            hit.score,
            hit.source_url,
            hit.chunk_index
        );
        let preview: String = hit.text.chars().take(200).collect();
        println!("   {}\n", preview.replace('\n', " "));
    }

    Ok(())
}

/// Handles the stats command
fn handle_stats(config: &Config, store: Option<PathBuf>) -> anyhow::Result<()> {
    let dir = store_dir(config, store);
    println!("Store: {}\n", dir.display());

    let store = SqliteVectorStore::open(&dir)?;
    print!("{}", format_store_stats(&store.stats()?));
    print!("{}", format_run_history(&store.recent_runs(10)?));

    Ok(())
}

/// Handles the check command: shows the effective settings
fn handle_check(config: &Config, config_hash: Option<&str>) -> anyhow::Result<()> {
    println!("=== Site-Index Configuration ===\n");

    if let Some(hash) = config_hash {
        println!("Config hash: {}\n", hash);
    }

    println!("Crawler:");
    println!("  Max pages: {}", config.crawler.max_pages);
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Same domain: {}", config.crawler.same_domain);
    println!(
        "  Concurrent fetches: {}",
        config.crawler.max_concurrent_fetches
    );
    println!(
        "  Timeouts: {}s request, {}s connect",
        config.crawler.request_timeout_secs, config.crawler.connect_timeout_secs
    );
    println!("  Retries: {}", config.crawler.max_retries);
    if config.crawler.min_request_interval_ms > 0 {
        println!(
            "  Per-host interval: {}ms",
            config.crawler.min_request_interval_ms
        );
    }

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nChunking:");
    println!("  Size: {} chars", config.chunking.chunk_size);
    println!("  Overlap: {} chars", config.chunking.chunk_overlap);

    let provider = ProviderKind::parse(&config.embedding.provider)?;
    println!("\nEmbedding:");
    println!("  Provider: {}", provider);
    println!(
        "  Model: {}",
        config
            .embedding
            .model
            .as_deref()
            .unwrap_or(provider.default_model())
    );
    println!(
        "  API base: {}",
        config
            .embedding
            .api_base
            .as_deref()
            .unwrap_or(provider.default_api_base())
    );
    if let Some(env_var) = provider.api_key_env() {
        let has_key = config.embedding.api_key.is_some() || std::env::var(env_var).is_ok();
        println!(
            "  API key: {}",
            if has_key { "set" } else { "missing" }
        );
    }
    println!(
        "  Batch size: {}, concurrency: {}",
        config.embedding.batch_size, config.embedding.concurrency
    );

    println!("\nStore: {}", config.store.path);

    println!("\nAllow ({}):", config.allow.len());
    for entry in &config.allow {
        println!("  - {}", entry.domain);
    }
    println!("\nDeny ({}):", config.deny.len());
    for entry in &config.deny {
        println!("  - {}", entry.domain);
    }

    println!("\n✓ Configuration is valid");

    Ok(())
}
