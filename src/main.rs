//! Resume-Crawl main entry point
//!
//! This is the command-line interface for the Resume-Crawl page crawler.

use anyhow::Context;
use clap::Parser;
use resume_crawl::config::{load_config_with_hash, Config};
use resume_crawl::crawler::{crawl, Coordinator, FetchMode};
use resume_crawl::output::{export_results, load_statistics, print_statistics};
use resume_crawl::storage::open_store;
use resume_crawl::CrawlError;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Resume-Crawl: a resumable page crawler
///
/// Resume-Crawl fetches a list of URLs with bounded concurrency, either as raw
/// HTML or rendered in a browser, and commits the results in numbered batches
/// to a SQLite checkpoint store. An interrupted run picks up where it stopped.
#[derive(Parser, Debug)]
#[command(name = "resume-crawl")]
#[command(version = "1.0.0")]
#[command(about = "A resumable, bounded-concurrency page crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Discard the existing checkpoint and stored batches first
    #[arg(long)]
    fresh: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "export"])]
    dry_run: bool,

    /// Show statistics from the checkpoint store and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export"])]
    stats: bool,

    /// Write every stored page result to PATH as JSON and exit
    #[arg(long, value_name = "PATH", conflicts_with_all = ["dry_run", "stats"])]
    export: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{:#}", e);
            let non_recoverable = e
                .downcast_ref::<CrawlError>()
                .is_some_and(CrawlError::is_non_recoverable);
            if non_recoverable {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(config).await
    } else if cli.stats {
        handle_stats(&config)
    } else if let Some(path) = &cli.export {
        handle_export(&config, path)
    } else {
        handle_crawl(config, cli.fresh).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("resume_crawl=info,warn"),
            1 => EnvFilter::new("resume_crawl=debug,info"),
            2 => EnvFilter::new("resume_crawl=trace,debug"),
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

/// Handles the --dry-run mode: resolves the input and shows where a run would start
async fn handle_dry_run(config: Config) -> anyhow::Result<()> {
    println!("=== Resume-Crawl Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Concurrency: {}", config.crawler.concurrency);
    println!("  Flush threshold: {}", config.crawler.flush_threshold);
    println!("  Settle delay: {}s", config.crawler.settle_secs);
    println!("  On flush error: {:?}", config.crawler.on_flush_error);
    if config.crawler.page_timeout_secs > 0 {
        println!("  Page timeout: {}s", config.crawler.page_timeout_secs);
    }

    println!("\nInput:");
    println!("  Inline URLs: {}", config.input.urls.len());
    if let Some(list_url) = &config.input.url_list_file {
        println!("  URL list file: {}", list_url);
    }
    println!("  Proxies: {}", config.input.proxy_urls.len());
    println!("  User agents: {}", config.input.user_agents.len());

    println!("\nStore:");
    println!("  Database: {}", config.store.database_path);

    let coordinator = Coordinator::inspect(config)?;
    let input = coordinator.prepare_input().await?;
    let progress = coordinator.resume_progress(&input.fingerprint())?;
    let skip = progress.resume_offset(input.urls.len());

    let mode = match input.mode {
        FetchMode::Raw => "raw HTML".to_string(),
        FetchMode::Rendered => format!("rendered via {}", coordinator.config().browser.webdriver_url),
    };

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would crawl {} of {} URLs ({}), skipping {} already committed",
        input.urls.len() - skip,
        input.urls.len(),
        mode,
        skip
    );

    Ok(())
}

/// Handles the --stats mode: shows statistics from the checkpoint store
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.store.database_path);

    let store = open_store(
        Path::new(&config.store.database_path),
        config.store.max_record_bytes,
    )?;
    let stats = load_statistics(&store)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export mode: writes all committed page results as JSON
fn handle_export(config: &Config, path: &Path) -> anyhow::Result<()> {
    println!("=== Exporting Crawl Results ===\n");
    println!("Database: {}", config.store.database_path);
    println!("Output: {}", path.display());
    println!();

    let store = open_store(
        Path::new(&config.store.database_path),
        config.store.max_record_bytes,
    )?;
    let count = export_results(&store, path)?;

    println!("✓ Exported {} pages to: {}", count, path.display());

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, fresh: bool) -> anyhow::Result<()> {
    if fresh {
        tracing::info!("Starting fresh crawl (ignoring previous state)");
    } else {
        tracing::info!("Starting crawl (will resume from the checkpoint if one exists)");
    }

    let outcome = crawl(config, fresh).await?;

    tracing::info!(
        "Crawl completed successfully: {} pages processed, {} failed, {} skipped, {} committed in {} batches",
        outcome.pages_processed,
        outcome.failures,
        outcome.skipped,
        outcome.progress.pages_completed_count,
        outcome.progress.batches_written_count
    );

    Ok(())
}
