use crate::UrlError;
use url::{ParseError, Url};

/// Normalizes a request URL
///
/// # Normalization Steps
///
/// 1. Trim surrounding whitespace
/// 2. Default the scheme to `http` when it is absent (`example.com/page`,
///    `//example.com/page`, `localhost:8080/page`)
/// 3. Reject schemes other than `http` and `https`
/// 4. Require a host
///
/// Unlike crawl-graph normalization, the path, query and fragment are kept
/// exactly as given: two requests for differently spelled URLs stay distinct.
///
/// # Examples
///
/// ```
/// use sumi_harvest::url::normalize_url;
///
/// let url = normalize_url("example.com/page").unwrap();
/// assert_eq!(url.as_str(), "http://example.com/page");
///
/// let url = normalize_url("https://example.com/").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let trimmed = url_str.trim();
    if trimmed.is_empty() {
        return Err(UrlError::Parse("empty URL".to_string()));
    }

    let url = match Url::parse(trimmed) {
        Ok(url) if is_web_scheme(url.scheme()) => url,
        // "localhost:8080/x" parses with scheme "localhost"
        Ok(url) if url.cannot_be_a_base() && url.path().starts_with(|c: char| c.is_ascii_digit()) => {
            with_default_scheme(trimmed)?
        }
        Ok(url) => {
            return Err(UrlError::InvalidScheme(format!(
                "Only HTTP and HTTPS schemes are supported, got: {}",
                url.scheme()
            )))
        }
        Err(ParseError::RelativeUrlWithoutBase) => with_default_scheme(trimmed)?,
        Err(e) => return Err(UrlError::Parse(format!("{}: {}", trimmed, e))),
    };

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(UrlError::MissingDestination(trimmed.to_string())),
    }
}

fn with_default_scheme(url_str: &str) -> Result<Url, UrlError> {
    let candidate = if url_str.starts_with("//") {
        format!("http:{}", url_str)
    } else {
        format!("http://{}", url_str)
    };

    Url::parse(&candidate).map_err(|e| UrlError::Parse(format!("{}: {}", url_str, e)))
}

fn is_web_scheme(scheme: &str) -> bool {
    scheme == "http" || scheme == "https"
}
