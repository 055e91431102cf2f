use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Main configuration structure for Sumi-Harvest
///
/// Every section is optional in the TOML file; missing keys fall back to the
/// defaults below.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HarvestConfig {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub adaptive: AdaptiveConfig,
}

/// Scheduler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum number of fetches in flight at once
    #[serde(rename = "max-concurrency", default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Per-request timeout (seconds)
    #[serde(rename = "request-timeout", default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Number of reclaims allowed before a failing request is terminal
    #[serde(rename = "max-retries", default = "default_max_retries")]
    pub max_retries: u32,

    /// Stop the run once the frontier is drained and nothing is in flight
    #[serde(rename = "exit-on-empty-queue", default = "default_true")]
    pub exit_on_empty_queue: bool,
}

/// Light fetcher configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,

    /// Headers sent with every request unless the request overrides them
    #[serde(rename = "default-headers", default = "default_headers")]
    pub default_headers: BTreeMap<String, String>,
}

/// Persistence configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    /// SQLite database for the frontier and dataset; in-memory when absent
    #[serde(rename = "database-path", default)]
    pub database_path: Option<String>,
}

/// Adaptive mode selection thresholds
#[derive(Debug, Clone, Deserialize)]
pub struct AdaptiveConfig {
    /// Bodies with less extracted text than this look unrendered
    #[serde(rename = "min-text-length", default = "default_min_text_length")]
    pub min_text_length: usize,

    /// Bodies with more script blocks than this look script-driven
    #[serde(rename = "max-script-blocks", default = "default_max_script_blocks")]
    pub max_script_blocks: usize,

    /// Also check 2xx light responses for rendering needs
    #[serde(rename = "escalate-on-success", default)]
    pub escalate_on_success: bool,
}

impl CrawlerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            request_timeout: default_request_timeout(),
            max_retries: default_max_retries(),
            exit_on_empty_queue: true,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            default_headers: default_headers(),
        }
    }
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            min_text_length: default_min_text_length(),
            max_script_blocks: default_max_script_blocks(),
            escalate_on_success: false,
        }
    }
}

fn default_max_concurrency() -> usize {
    10
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_true() -> bool {
    true
}

fn default_user_agent() -> String {
    format!("SumiHarvest/{}", env!("CARGO_PKG_VERSION"))
}

fn default_headers() -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    headers.insert(
        "Accept".to_string(),
        "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
    );
    headers.insert("Accept-Language".to_string(), "en;q=0.9".to_string());
    headers
}

fn default_min_text_length() -> usize {
    1000
}

fn default_max_script_blocks() -> usize {
    5
}
