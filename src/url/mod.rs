//! URL handling module for Sumi-Harvest
//!
//! This module provides request URL normalization, destination extraction,
//! derived routing keys for the adaptive pattern cache, and URL patterns.

mod normalize;
mod pattern;

pub use normalize::normalize_url;
pub use pattern::UrlPattern;

use url::Url;

/// Extracts the destination (lowercase host) from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_harvest::url::extract_destination;
///
/// let url = Url::parse("https://EXAMPLE.com:8080/path").unwrap();
/// assert_eq!(extract_destination(&url), Some("example.com".to_string()));
/// ```
pub fn extract_destination(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Computes the coarse routing key used to remember per-site fetch modes
///
/// The key is the destination, the port when it is not the scheme default,
/// and at most the first two non-empty path segments. The result is matched
/// as a substring of full URLs, so the port is kept to stay a substring of
/// URLs that carry one.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use sumi_harvest::url::derived_pattern;
///
/// let url = Url::parse("https://shop.example.com/products/42/reviews?page=2").unwrap();
/// assert_eq!(derived_pattern(&url), "shop.example.com/products/42");
///
/// let url = Url::parse("https://example.com/").unwrap();
/// assert_eq!(derived_pattern(&url), "example.com");
/// ```
pub fn derived_pattern(url: &Url) -> String {
    let mut pattern = extract_destination(url).unwrap_or_default();

    if let Some(port) = url.port() {
        pattern.push(':');
        pattern.push_str(&port.to_string());
    }

    if let Some(segments) = url.path_segments() {
        for segment in segments.filter(|s| !s.is_empty()).take(2) {
            pattern.push('/');
            pattern.push_str(segment);
        }
    }

    pattern
}
