//! Fetch layer
//!
//! This module defines the [`Fetcher`] capability the crawler executes
//! requests through, together with:
//! - [`HttpFetcher`]: the light path over `reqwest`
//! - [`AdaptiveFetcher`]: picks light or heavy per URL and learns from outcomes

mod adaptive;
mod http;

pub use crate::model::FetchMode;
pub use adaptive::{needs_heavy_rendering, AdaptiveFetcher, ModeSelector, PatternSnapshot};
pub use http::{build_http_client, HttpFetcher};

use crate::model::{Request, Response};
use crate::session::Cookie;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Executes one request into one response
///
/// `execute` never fails: transport problems are reported as a response
/// with status `0` and an error note. The adapter methods translate the
/// fetcher's response shape into cookies and headers for the session pool;
/// the defaults read them from the response headers.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Which fetch path this fetcher implements
    fn mode(&self) -> FetchMode;

    async fn execute(&self, request: &Request) -> Response;

    /// Cookies set by the response, parsed from `Set-Cookie`
    fn extract_cookies(&self, response: &Response) -> Vec<Cookie> {
        let destination = response.request().destination();
        response
            .header_values("set-cookie")
            .iter()
            .filter_map(|header| Cookie::parse_set_cookie(header, &destination))
            .collect()
    }

    /// Response headers with repeated values joined by `", "`
    fn extract_headers(&self, response: &Response) -> BTreeMap<String, String> {
        response
            .headers()
            .iter()
            .map(|(name, values)| (name.clone(), values.join(", ")))
            .collect()
    }

    /// The pattern cache behind this fetcher, if it selects modes adaptively
    fn mode_selector(&self) -> Option<Arc<ModeSelector>> {
        None
    }
}
