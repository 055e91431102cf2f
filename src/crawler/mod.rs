//! Crawler module for request scheduling and response handling
//!
//! This module contains the core crawling logic, including:
//! - The bounded-concurrency scheduling loop with retry policy
//! - Pattern-based routing of completed exchanges to handlers
//! - The handler context (enqueueing, saving records, pattern hints)
//! - Run statistics

mod context;
mod router;
mod scheduler;
mod stats;

pub use context::Context;
pub use router::{Handler, Router};
pub use scheduler::{Crawler, RunState};
pub use stats::{CrawlStats, DatasetInfo, RunSummary, StatsSnapshot};

use crate::config::HarvestConfig;
use crate::fetch::HttpFetcher;
use crate::storage::open_stores;
use std::sync::Arc;

/// Runs a complete crawl with the light HTTP fetcher
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Open the frontier and dataset (SQLite when a database path is configured)
/// 2. Build the HTTP client
/// 3. Queue the seed URLs
/// 4. Run until the frontier is drained
///
/// # Arguments
///
/// * `config` - The harvest configuration
/// * `seeds` - Start URLs; may be empty when resuming a persisted frontier
/// * `router` - Handlers for completed exchanges
///
/// # Returns
///
/// * `Ok(RunSummary)` - Crawl completed
/// * `Err(HarvestError)` - Setup failed or the frontier store failed
pub async fn crawl(
    config: &HarvestConfig,
    seeds: &[String],
    router: Router,
) -> crate::Result<RunSummary> {
    let (frontier, dataset) = open_stores(&config.storage)?;
    let fetcher = Arc::new(HttpFetcher::new(config)?);

    let crawler = Crawler::new(
        config,
        fetcher,
        router,
        Arc::new(frontier),
        Arc::new(dataset),
    );
    crawler.enqueue_all(seeds.iter().map(String::as_str))?;

    crawler.run().await
}
