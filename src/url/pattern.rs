use crate::ConfigError;
use regex::Regex;
use std::fmt;

/// A URL predicate used by the router and the adaptive pattern cache
///
/// Two kinds are supported:
/// 1. Substring: matches when the URL contains the literal text
/// 2. Regex: matches when the compiled expression finds a match in the URL
///
/// # Examples
///
/// ```
/// use sumi_harvest::url::UrlPattern;
///
/// let literal = UrlPattern::substring("/products/");
/// assert!(literal.matches("https://shop.example.com/products/42"));
///
/// let expr = UrlPattern::regex(r"/item/\d+$").unwrap();
/// assert!(expr.matches("https://shop.example.com/item/42"));
/// assert!(!expr.matches("https://shop.example.com/item/abc"));
/// ```
#[derive(Debug, Clone)]
pub enum UrlPattern {
    Substring(String),
    Regex(Regex),
}

impl UrlPattern {
    pub fn substring(text: impl Into<String>) -> Self {
        Self::Substring(text.into())
    }

    /// Compiles a regular-expression pattern
    ///
    /// An invalid expression is a configuration error, raised here rather
    /// than at match time.
    pub fn regex(expr: &str) -> Result<Self, ConfigError> {
        Regex::new(expr)
            .map(Self::Regex)
            .map_err(|e| ConfigError::InvalidPattern(format!("{}: {}", expr, e)))
    }

    pub fn matches(&self, url: &str) -> bool {
        match self {
            Self::Substring(text) => url.contains(text.as_str()),
            Self::Regex(regex) => regex.is_match(url),
        }
    }

    /// The pattern's source text
    pub fn as_str(&self) -> &str {
        match self {
            Self::Substring(text) => text,
            Self::Regex(regex) => regex.as_str(),
        }
    }

    pub fn is_regex(&self) -> bool {
        matches!(self, Self::Regex(_))
    }
}

impl PartialEq for UrlPattern {
    fn eq(&self, other: &Self) -> bool {
        self.is_regex() == other.is_regex() && self.as_str() == other.as_str()
    }
}

impl Eq for UrlPattern {}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Substring(text) => write!(f, "{}", text),
            Self::Regex(regex) => write!(f, "/{}/", regex.as_str()),
        }
    }
}

impl From<&str> for UrlPattern {
    fn from(text: &str) -> Self {
        Self::Substring(text.to_string())
    }
}

impl From<String> for UrlPattern {
    fn from(text: String) -> Self {
        Self::Substring(text)
    }
}

impl From<Regex> for UrlPattern {
    fn from(regex: Regex) -> Self {
        Self::Regex(regex)
    }
}
