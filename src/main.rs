//! Sumi-Harvest main entry point
//!
//! This is the command-line interface for the Sumi-Harvest crawl engine.

use clap::Parser;
use serde_json::json;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;
use sumi_harvest::config::{load_config_with_hash, HarvestConfig};
use sumi_harvest::crawler::{crawl, Router};
use sumi_harvest::storage::open_stores;
use tracing_subscriber::EnvFilter;

/// Sumi-Harvest: a crawl-orchestration engine
///
/// Fetches the seed URLs with bounded concurrency and retries, saving the
/// URL, status and title of every page to the dataset. With --follow, links
/// that stay on the same destination are crawled too.
#[derive(Parser, Debug)]
#[command(name = "sumi-harvest")]
#[command(version)]
#[command(about = "A crawl-orchestration engine", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Start URLs
    #[arg(value_name = "SEED")]
    seeds: Vec<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Also crawl links that stay on the page's destination
    #[arg(long)]
    follow: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show frontier and dataset counts from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config, &cli.seeds)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(&config, &cli.seeds, cli.follow).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_harvest=info,warn"),
            1 => EnvFilter::new("sumi_harvest=debug,info"),
            2 => EnvFilter::new("sumi_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Handles the --dry-run mode: validates config and seeds
fn handle_dry_run(
    config: &HarvestConfig,
    seeds: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Sumi-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max concurrency: {}", config.crawler.max_concurrency);
    println!("  Request timeout: {}s", config.crawler.request_timeout);
    println!("  Max retries: {}", config.crawler.max_retries);
    println!("  Exit on empty queue: {}", config.crawler.exit_on_empty_queue);

    println!("\nHTTP:");
    println!("  User agent: {}", config.http.user_agent);
    for (name, value) in &config.http.default_headers {
        println!("  {}: {}", name, value);
    }

    println!("\nStorage:");
    match &config.storage.database_path {
        Some(path) => println!("  Database: {}", path),
        None => println!("  In-memory"),
    }

    println!("\nSeeds ({}):", seeds.len());
    for seed in seeds {
        let request = sumi_harvest::Request::new(seed)?;
        println!("  * {}", request.url());
    }

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the --stats mode: shows counts from the database
fn handle_stats(config: &HarvestConfig) -> Result<(), Box<dyn std::error::Error>> {
    let Some(path) = &config.storage.database_path else {
        return Err("No database-path configured; nothing to report".into());
    };

    println!("Database: {}\n", path);

    let (frontier, dataset) = open_stores(&config.storage)?;
    let info = frontier.info()?;

    println!("Frontier:");
    println!("  Pending: {}", info.pending_count);
    println!("  Handled: {}", info.handled_count);
    println!("  Total: {}", info.total_count);
    println!("\nDataset:");
    println!("  Records: {}", dataset.count()?);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: &HarvestConfig,
    seeds: &[String],
    follow: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Total seed URLs: {}", seeds.len());

    // Identity dedup would re-crawl a URL each time it is linked
    let seen: Mutex<HashSet<String>> = Mutex::new(
        seeds
            .iter()
            .filter_map(|seed| sumi_harvest::Request::new(seed).ok())
            .map(|request| request.url().to_string())
            .collect(),
    );

    let mut router = Router::new();
    router.set_default(move |ctx| {
        let response = ctx.response();
        ctx.save_data(json!({
            "url": response.url().as_str(),
            "status": response.status(),
            "title": response.html().title,
        }))?;

        if follow {
            let destination = ctx.request().destination();
            for link in &ctx.html().links {
                match sumi_harvest::Request::new(link) {
                    Ok(request) if request.destination() == destination => {
                        let first_visit = seen
                            .lock()
                            .unwrap_or_else(|e| e.into_inner())
                            .insert(request.url().to_string());
                        if first_visit {
                            ctx.enqueue_request(request)?;
                        }
                    }
                    _ => {}
                }
            }
        }

        Ok(())
    });

    match crawl(config, seeds, router).await {
        Ok(summary) => {
            tracing::info!("Crawl completed successfully");
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
