//! Gatherer main entry point
//!
//! This is the command-line interface for the Gatherer fetch engine.

use anyhow::Context;
use clap::Parser;
use gatherer::config::{load_config_with_hash, Config};
use gatherer::crawler::{extract_text, format_size, scheduler_from_config, Hooks};
use gatherer::queue::TaskQueue;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Gatherer: a concurrent HTTP fetch engine
///
/// Gatherer fetches every seed URL from its configuration with a bounded
/// worker pool, retrying according to the status-code table, and logs the
/// text selected from each successful page.
#[derive(Parser, Debug)]
#[command(name = "gatherer")]
#[command(version)]
#[command(about = "A concurrent HTTP fetch engine", long_about = None)]
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

    /// Validate config and show what would be fetched without fetching
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    if cli.dry_run {
        print_dry_run(&config);
        return Ok(());
    }

    run(config).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("gatherer=info,warn"),
            1 => EnvFilter::new("gatherer=debug,info"),
            2 => EnvFilter::new("gatherer=trace,debug"),
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

/// Handles --dry-run: shows the effective settings and seeds
fn print_dry_run(config: &Config) {
    println!("=== Gatherer Dry Run ===\n");

    println!("Engine:");
    println!("  Workers: {}", config.engine.workers);
    println!("  Max attempts: {}", config.engine.max_attempts);
    println!("  Request timeout: {}ms", config.engine.request_timeout_ms);
    println!("  Retry backoff: {}ms", config.engine.retry_backoff_ms);
    println!("  Requeue failed: {}", config.engine.requeue_failed);

    println!("\nStatus overrides ({}):", config.status_codes.len());
    for (code, category) in &config.status_codes {
        println!("  {} -> {}", code, category);
    }

    println!("\nCookies: {}", config.cookies.len());
    println!("Selector: {}", config.extract.selector);

    println!("\nSeeds ({}):", config.seeds.len());
    for seed in &config.seeds {
        println!("  - {}", seed.url);
    }

    println!("\n✓ Configuration is valid");
}

/// Seeds the queue and runs the scheduler to completion
async fn run(config: Config) -> anyhow::Result<()> {
    let queue = TaskQueue::new();
    config.seed_queue(&queue);
    tracing::info!("Seeded {} tasks", queue.len());

    let selector = config.extract.selector.clone();
    let retry_backoff = Duration::from_millis(config.engine.retry_backoff_ms);
    let requeue_limit = config.engine.requeue_failed;

    let hooks = Hooks::new()
        .on_succeed(move |ctx| {
            let selected = match extract_text(&ctx.resp_text(), &selector) {
                Ok(texts) => texts.join(" | "),
                Err(e) => {
                    tracing::warn!(url = %ctx.url(), error = %e, "Extraction failed");
                    return;
                }
            };
            tracing::info!(
                url = %ctx.url(),
                size = %format_size(ctx.resp_body().len() as u64),
                latency_ms = ctx.latency().as_millis() as u64,
                "{}",
                selected
            );
        })
        .on_retry(move |ctx| {
            ctx.set_retry_delay(retry_backoff);
        })
        .on_fail(move |ctx| {
            let requeues = ctx.task().map_or(0, |t| t.requeue_count());
            if requeues < requeue_limit {
                if let Err(e) = ctx.requeue_task() {
                    tracing::warn!(url = %ctx.url(), error = %e, "Could not requeue task");
                }
            } else if let Some(error) = ctx.last_error() {
                tracing::warn!(url = %ctx.url(), %error, "Giving up on task");
            }
        });

    let scheduler = scheduler_from_config(&config, queue.clone(), hooks)?;
    let report = scheduler.run().await;

    println!("=== Gatherer Report ===\n");
    println!("  Succeeded:        {}", report.succeeded);
    println!("  Failed:           {}", report.failed);
    println!("  Retries exhausted: {}", report.exhausted);
    println!("  Stopped:          {}", report.stopped);
    println!("  Malformed:        {}", report.malformed);

    let leftover = queue.snapshot_urls();
    if !leftover.is_empty() {
        println!("\nStill queued ({}):", leftover.len());
        for url in leftover {
            println!("  - {}", url);
        }
    }

    Ok(())
}
