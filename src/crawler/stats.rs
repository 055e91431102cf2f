//! Run statistics
//!
//! Counters are lock-free so worker tasks can update them without touching
//! any of the crawl's mutexes.

use crate::frontier::FrontierInfo;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters for one run
#[derive(Debug, Default)]
pub struct CrawlStats {
    requests_total: AtomicU64,
    requests_successful: AtomicU64,
    requests_failed: AtomicU64,
    requests_retried: AtomicU64,
}

impl CrawlStats {
    /// One fetch attempt started
    pub fn record_attempt(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_success(&self) {
        self.requests_successful.fetch_add(1, Ordering::Relaxed);
    }

    /// A request failed with no retries left
    pub fn record_failure(&self) {
        self.requests_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// A request failed and went back to the frontier
    pub fn record_retry(&self) {
        self.requests_retried.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn reset(&self) {
        self.requests_total.store(0, Ordering::Relaxed);
        self.requests_successful.store(0, Ordering::Relaxed);
        self.requests_failed.store(0, Ordering::Relaxed);
        self.requests_retried.store(0, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            requests_successful: self.requests_successful.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            requests_retried: self.requests_retried.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the run counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub requests_total: u64,
    pub requests_successful: u64,
    pub requests_failed: u64,
    pub requests_retried: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DatasetInfo {
    pub count: usize,
}

/// What a finished run reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub requests_total: u64,
    pub requests_successful: u64,
    pub requests_failed: u64,
    pub requests_retried: u64,
    pub frontier: FrontierInfo,
    pub dataset: DatasetInfo,
}

impl RunSummary {
    pub fn new(stats: StatsSnapshot, frontier: FrontierInfo, dataset: DatasetInfo) -> Self {
        Self {
            requests_total: stats.requests_total,
            requests_successful: stats.requests_successful,
            requests_failed: stats.requests_failed,
            requests_retried: stats.requests_retried,
            frontier,
            dataset,
        }
    }
}
