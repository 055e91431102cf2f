//! Sumi-Harvest: a crawl-orchestration engine
//!
//! This crate schedules fetch work over a deduplicated request frontier,
//! bounds concurrency, retries failed requests, keeps per-destination cookie
//! sessions, routes completed exchanges to handlers, and can adaptively pick
//! between a light fetcher and a render-capable heavy fetcher.

pub mod config;
pub mod crawler;
pub mod fetch;
pub mod frontier;
pub mod model;
pub mod session;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Sumi-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Crawler is already running")]
    AlreadyRunning,
}

/// Configuration and validation errors
///
/// These are raised at construction time and never silently defaulted.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unsupported HTTP method: {0}")]
    InvalidMethod(String),

    #[error("Invalid URL pattern: {0}")]
    InvalidPattern(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing destination in URL: {0}")]
    MissingDestination(String),
}

/// Result type alias for Sumi-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::HarvestConfig;
pub use crawler::{Context, Crawler, Handler, RunState, RunSummary, Router};
pub use fetch::{AdaptiveFetcher, FetchMode, Fetcher, HttpFetcher, ModeSelector};
pub use frontier::{FrontierInfo, RequestFrontier};
pub use model::{Method, Request, RequestId, Response};
pub use session::{Cookie, Session, SessionPool};
pub use storage::{Dataset, Record};
pub use crate::url::UrlPattern;
