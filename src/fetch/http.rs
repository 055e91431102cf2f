//! Light HTTP fetcher
//!
//! Plain `reqwest` fetches: no script execution, redirects followed by the
//! client, compressed bodies decoded transparently.

use crate::config::HarvestConfig;
use crate::fetch::{FetchMode, Fetcher};
use crate::model::{Method, Request, Response, Timing};
use crate::{ConfigError, HarvestError};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{redirect::Policy, Client};
use std::time::{Duration, Instant};
use tracing::debug;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The harvest configuration (user agent, default headers, timeout)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(HarvestError)` - Invalid default header or client build failure
///
/// # Example
///
/// ```no_run
/// use sumi_harvest::config::HarvestConfig;
/// use sumi_harvest::fetch::build_http_client;
///
/// let client = build_http_client(&HarvestConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &HarvestConfig) -> Result<Client, HarvestError> {
    let mut headers = HeaderMap::new();
    for (name, value) in &config.http.default_headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ConfigError::InvalidHeader(format!("{}: {}", name, e)))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|e| ConfigError::InvalidHeader(format!("{}: {}", name, e)))?;
        headers.insert(header_name, header_value);
    }

    let timeout = config.crawler.request_timeout();

    let client = Client::builder()
        .user_agent(config.http.user_agent.as_str())
        .default_headers(headers)
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()?;

    Ok(client)
}

/// Fetcher for the light path
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &HarvestConfig) -> Result<Self, HarvestError> {
        Ok(Self {
            client: build_http_client(config)?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Delete => reqwest::Method::DELETE,
        Method::Head => reqwest::Method::HEAD,
        Method::Options => reqwest::Method::OPTIONS,
        Method::Patch => reqwest::Method::PATCH,
    }
}

/// Describes a transport failure
fn classify_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "Request timeout".to_string()
    } else if e.is_connect() {
        format!("Connection failed: {}", e)
    } else if e.is_redirect() {
        format!("Redirect error: {}", e)
    } else {
        e.to_string()
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    fn mode(&self) -> FetchMode {
        FetchMode::Light
    }

    /// Sends the request
    ///
    /// A payload is appended to the query string for GET and sent as the
    /// body for every other method.
    async fn execute(&self, request: &Request) -> Response {
        let started_at = Utc::now();
        let start = Instant::now();

        let mut url = request.url().clone();
        let mut body = None;
        if let Some(payload) = request.payload() {
            if request.method() == Method::Get {
                let query = match url.query() {
                    Some(existing) if !existing.is_empty() => format!("{}&{}", existing, payload),
                    _ => payload.to_string(),
                };
                url.set_query(Some(&query));
            } else {
                body = Some(payload.to_string());
            }
        }

        let mut builder = self
            .client
            .request(to_reqwest_method(request.method()), url);
        for (name, value) in request.headers() {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = body {
            builder = builder.body(body);
        }

        debug!("{} {}", request.method(), request.url());

        let failed = |e: reqwest::Error| {
            let error = classify_error(&e);
            debug!("Fetch of {} failed: {}", request.url(), error);
            Response::transport_error(
                request.clone(),
                FetchMode::Light,
                Timing::new(started_at, start.elapsed()),
                error,
            )
        };

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => return failed(e),
        };

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => return failed(e),
        };

        let mut builder = Response::builder(request.clone(), status)
            .url(final_url)
            .body(bytes.to_vec())
            .timing(Timing::new(started_at, start.elapsed()))
            .mode(FetchMode::Light);
        for (name, value) in headers {
            builder = builder.header(&name, value);
        }

        builder.build()
    }
}
