use crate::config::validate_header_name;
use crate::url::{extract_destination, normalize_url};
use crate::{ConfigError, HarvestError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use url::Url;
use uuid::Uuid;

/// Opaque request identity
///
/// Assigned once at creation and never reused. Frontier deduplication is
/// keyed on this value, not on the URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for RequestId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Patch,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
            Method::Patch => "PATCH",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ConfigError;

    /// Parses a method name, ignoring ASCII case
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            "PATCH" => Ok(Method::Patch),
            _ => Err(ConfigError::InvalidMethod(s.to_string())),
        }
    }
}

/// A unit of fetch work
///
/// Requests are created through [`Request::new`] or [`Request::builder`];
/// the URL is normalized and the method validated at construction. The
/// only field that changes afterwards is the retry counter, which the
/// frontier bumps on every reclaim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    id: RequestId,
    url: Url,
    method: Method,
    headers: BTreeMap<String, String>,
    payload: Option<String>,
    metadata: Map<String, Value>,
    retry_count: u32,
}

impl Request {
    /// Creates a GET request for `url`
    ///
    /// # Examples
    ///
    /// ```
    /// use sumi_harvest::Request;
    ///
    /// let request = Request::new("example.com/docs").unwrap();
    /// assert_eq!(request.url().as_str(), "http://example.com/docs");
    /// assert_eq!(request.retry_count(), 0);
    /// ```
    pub fn new(url: &str) -> crate::Result<Self> {
        Self::builder(url).build()
    }

    pub fn builder(url: impl Into<String>) -> RequestBuilder {
        RequestBuilder {
            url: url.into(),
            method: None,
            headers: BTreeMap::new(),
            payload: None,
            metadata: Map::new(),
        }
    }

    pub fn id(&self) -> RequestId {
        self.id
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn payload(&self) -> Option<&str> {
        self.payload.as_deref()
    }

    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Lowercase host of the target URL
    pub fn destination(&self) -> String {
        extract_destination(&self.url).unwrap_or_default()
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// Query parameters in order of appearance, percent-decoded
    pub fn query_params(&self) -> Vec<(String, String)> {
        self.url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    /// Copies everything except identity and retry state
    pub fn duplicate(&self) -> Self {
        Self {
            id: RequestId::new(),
            url: self.url.clone(),
            method: self.method,
            headers: self.headers.clone(),
            payload: self.payload.clone(),
            metadata: self.metadata.clone(),
            retry_count: 0,
        }
    }

    pub(crate) fn increment_retry(&mut self) {
        self.retry_count += 1;
    }

    /// Sets a header, replacing any existing entry with the same name
    pub(crate) fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.retain(|key, _| !key.eq_ignore_ascii_case(name));
        self.headers.insert(name.to_string(), value.into());
    }
}

/// Builder for [`Request`]
///
/// Validation is deferred to [`RequestBuilder::build`] so calls can be chained.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    url: String,
    method: Option<String>,
    headers: BTreeMap<String, String>,
    payload: Option<String>,
    metadata: Map<String, Value>,
}

impl RequestBuilder {
    /// Sets the method by name (case-insensitive)
    pub fn method(mut self, method: impl fmt::Display) -> Self {
        self.method = Some(method.to_string());
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn payload(mut self, payload: impl Into<String>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Validates and builds the request
    ///
    /// # Errors
    ///
    /// * `HarvestError::Url` - the URL cannot be normalized to HTTP(S)
    /// * `HarvestError::Config` - unknown method or invalid header name
    pub fn build(self) -> Result<Request, HarvestError> {
        let url = normalize_url(&self.url)?;

        let method = match self.method {
            Some(name) => name.parse::<Method>()?,
            None => Method::Get,
        };

        for name in self.headers.keys() {
            validate_header_name(name)?;
        }

        Ok(Request {
            id: RequestId::new(),
            url,
            method,
            headers: self.headers,
            payload: self.payload,
            metadata: self.metadata,
            retry_count: 0,
        })
    }
}
