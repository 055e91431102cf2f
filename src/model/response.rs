use crate::model::{FetchMode, HtmlView, Request};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// When a fetch started, how long it took, and why it failed if it did
#[derive(Debug, Clone, PartialEq)]
pub struct Timing {
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub error: Option<String>,
}

impl Timing {
    pub fn new(started_at: DateTime<Utc>, duration: Duration) -> Self {
        Self {
            started_at,
            duration,
            error: None,
        }
    }

    /// Timing for a fetch that starts now
    pub fn starting_now() -> Self {
        Self::new(Utc::now(), Duration::ZERO)
    }
}

/// The immutable outcome of executing a [`Request`]
///
/// A status of `0` means the transport failed before any HTTP status was
/// received; the reason is in [`Response::error`].
///
/// Parsed views of the body ([`Response::html`], [`Response::json`]) are
/// computed on first access and cached for the lifetime of the response.
#[derive(Debug, Clone)]
pub struct Response {
    request: Request,
    status: u16,
    headers: BTreeMap<String, Vec<String>>,
    body: Vec<u8>,
    url: Url,
    timing: Timing,
    mode: FetchMode,
    html: OnceLock<HtmlView>,
    json: OnceLock<Value>,
}

impl Response {
    pub fn builder(request: Request, status: u16) -> ResponseBuilder {
        ResponseBuilder {
            url: request.url().clone(),
            request,
            status,
            headers: BTreeMap::new(),
            body: Vec::new(),
            timing: Timing::starting_now(),
            mode: FetchMode::Light,
        }
    }

    /// Builds the status-0 response for a fetch that never got an answer
    pub fn transport_error(
        request: Request,
        mode: FetchMode,
        mut timing: Timing,
        error: impl Into<String>,
    ) -> Self {
        timing.error = Some(error.into());
        Self::builder(request, 0).timing(timing).mode(mode).build()
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// All headers, keyed by lower-cased name
    pub fn headers(&self) -> &BTreeMap<String, Vec<String>> {
        &self.headers
    }

    /// First value of a header (name is case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.header_values(name).first().map(String::as_str)
    }

    pub fn header_values(&self, name: &str) -> &[String] {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body decoded as UTF-8, invalid sequences replaced
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Effective URL after redirects
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn error(&self) -> Option<&str> {
        self.timing.error.as_deref()
    }

    pub fn mode(&self) -> FetchMode {
        self.mode
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status)
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    /// Media type from the Content-Type header, without parameters
    pub fn content_type(&self) -> Option<String> {
        self.header("content-type").map(|ct| {
            ct.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }

    pub fn is_html(&self) -> bool {
        matches!(
            self.content_type().as_deref(),
            Some("text/html") | Some("application/xhtml+xml")
        )
    }

    pub fn is_json(&self) -> bool {
        self.content_type()
            .map(|ct| ct == "application/json" || ct.ends_with("+json"))
            .unwrap_or(false)
    }

    /// Document view of the body, parsed once
    ///
    /// Links in the view are resolved against the effective URL.
    pub fn html(&self) -> &HtmlView {
        self.html
            .get_or_init(|| HtmlView::parse(&self.text(), &self.url))
    }

    /// Body decoded as JSON, parsed once
    ///
    /// Returns `None` when the body is not valid JSON. A failed decode is
    /// not cached.
    pub fn json(&self) -> Option<&Value> {
        if let Some(value) = self.json.get() {
            return Some(value);
        }

        match serde_json::from_slice::<Value>(&self.body) {
            Ok(value) => Some(self.json.get_or_init(|| value)),
            Err(e) => {
                debug!("Body of {} is not JSON: {}", self.url, e);
                None
            }
        }
    }
}

/// Builder for [`Response`]
#[derive(Debug)]
pub struct ResponseBuilder {
    request: Request,
    status: u16,
    headers: BTreeMap<String, Vec<String>>,
    body: Vec<u8>,
    url: Url,
    timing: Timing,
    mode: FetchMode,
}

impl ResponseBuilder {
    /// Appends a header value; the name is stored lower-cased
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.into());
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets the effective URL (defaults to the request URL)
    pub fn url(mut self, url: Url) -> Self {
        self.url = url;
        self
    }

    pub fn timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn mode(mut self, mode: FetchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn build(self) -> Response {
        Response {
            request: self.request,
            status: self.status,
            headers: self.headers,
            body: self.body,
            url: self.url,
            timing: self.timing,
            mode: self.mode,
            html: OnceLock::new(),
            json: OnceLock::new(),
        }
    }
}
