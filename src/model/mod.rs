//! Request and response model
//!
//! A [`Request`] is one unit of fetch work with a stable identity; a
//! [`Response`] is the immutable outcome of executing it.

mod document;
mod request;
mod response;

pub use document::{resolve_link, HtmlView};
pub use request::{Method, Request, RequestBuilder, RequestId};
pub use response::{Response, ResponseBuilder, Timing};

use serde::{Deserialize, Serialize};
use std::fmt;

/// The fetch path a request was (or will be) executed through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchMode {
    /// Plain HTTP fetch, no script execution
    #[default]
    Light,
    /// Fetch through a rendering engine
    Heavy,
}

impl fmt::Display for FetchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchMode::Light => write!(f, "light"),
            FetchMode::Heavy => write!(f, "heavy"),
        }
    }
}
