use crate::config::types::{AdaptiveConfig, CrawlerConfig, HarvestConfig, HttpConfig, StorageConfig};
use crate::ConfigError;

/// Validates the entire configuration
pub fn validate(config: &HarvestConfig) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_http_config(&config.http)?;
    validate_storage_config(&config.storage)?;
    validate_adaptive_config(&config.adaptive)?;
    Ok(())
}

/// Validates scheduler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrency < 1 || config.max_concurrency > 1000 {
        return Err(ConfigError::Validation(format!(
            "max_concurrency must be between 1 and 1000, got {}",
            config.max_concurrency
        )));
    }

    if config.request_timeout < 1 {
        return Err(ConfigError::Validation(format!(
            "request_timeout must be >= 1 second, got {}",
            config.request_timeout
        )));
    }

    if config.max_retries > 100 {
        return Err(ConfigError::Validation(format!(
            "max_retries must be <= 100, got {}",
            config.max_retries
        )));
    }

    Ok(())
}

/// Validates light fetcher configuration
fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    for name in config.default_headers.keys() {
        validate_header_name(name)?;
    }

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if let Some(path) = &config.database_path {
        if path.trim().is_empty() {
            return Err(ConfigError::Validation(
                "database_path cannot be empty when set".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_adaptive_config(config: &AdaptiveConfig) -> Result<(), ConfigError> {
    if config.min_text_length == 0 {
        return Err(ConfigError::Validation(
            "min_text_length must be >= 1".to_string(),
        ));
    }
    Ok(())
}

/// Validates an HTTP header name (RFC 7230 token characters)
pub(crate) fn validate_header_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::InvalidHeader(
            "Header name cannot be empty".to_string(),
        ));
    }

    let is_token = name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c));

    if !is_token {
        return Err(ConfigError::InvalidHeader(format!(
            "Header name '{}' contains invalid characters",
            name
        )));
    }

    Ok(())
}
