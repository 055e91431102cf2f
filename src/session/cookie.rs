use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A cookie held by a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub expires: Option<DateTime<Utc>>,
    pub http_only: bool,
    pub secure: bool,
    /// Set when the server explicitly expired the cookie (e.g. `Max-Age=0`)
    pub expired: bool,
}

impl Cookie {
    /// Creates a session cookie scoped to `domain` with path `/`
    pub fn new(name: impl Into<String>, value: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: "/".to_string(),
            expires: None,
            http_only: false,
            secure: false,
            expired: false,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expired || self.expires.map(|at| at <= Utc::now()).unwrap_or(false)
    }

    /// Parses one `Set-Cookie` header value
    ///
    /// `default_domain` is used when the header carries no `Domain`
    /// attribute. `Max-Age` wins over `Expires` when both are present.
    /// Returns `None` when the name/value pair is missing or the name is empty.
    ///
    /// # Examples
    ///
    /// ```
    /// use sumi_harvest::session::Cookie;
    ///
    /// let cookie = Cookie::parse_set_cookie("sid=abc; Path=/app; HttpOnly", "example.com").unwrap();
    /// assert_eq!(cookie.name, "sid");
    /// assert_eq!(cookie.path, "/app");
    /// assert!(cookie.http_only);
    /// ```
    pub fn parse_set_cookie(header: &str, default_domain: &str) -> Option<Self> {
        let mut parts = header.split(';');
        let (name, value) = parts.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let mut cookie = Cookie::new(name, value.trim().trim_matches('"'), default_domain);
        let mut max_age: Option<i64> = None;

        for attribute in parts {
            let (key, val) = match attribute.split_once('=') {
                Some((k, v)) => (k.trim(), v.trim()),
                None => (attribute.trim(), ""),
            };

            match key.to_ascii_lowercase().as_str() {
                "domain" if !val.is_empty() => {
                    cookie.domain = val.trim_start_matches('.').to_ascii_lowercase();
                }
                "path" if !val.is_empty() => cookie.path = val.to_string(),
                "expires" => {
                    cookie.expires = DateTime::parse_from_rfc2822(val)
                        .ok()
                        .map(|at| at.with_timezone(&Utc));
                }
                "max-age" => max_age = val.parse().ok(),
                "httponly" => cookie.http_only = true,
                "secure" => cookie.secure = true,
                _ => {}
            }
        }

        if let Some(seconds) = max_age {
            if seconds <= 0 {
                cookie.expired = true;
            } else {
                cookie.expires = Some(Utc::now() + Duration::seconds(seconds));
            }
        }

        Some(cookie)
    }
}
