use crate::fetch::ModeSelector;
use crate::frontier::RequestFrontier;
use crate::model::{HtmlView, Request, Response};
use crate::storage::{Dataset, Record};
use crate::url::UrlPattern;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

/// Everything a handler sees for one completed exchange
///
/// Besides read access to the request and response, the context lets a
/// handler queue follow-up requests, save records, and teach the adaptive
/// fetcher about URL patterns.
pub struct Context {
    response: Response,
    frontier: Arc<RequestFrontier>,
    dataset: Arc<Dataset>,
    selector: Option<Arc<ModeSelector>>,
}

impl Context {
    pub(crate) fn new(
        response: Response,
        frontier: Arc<RequestFrontier>,
        dataset: Arc<Dataset>,
        selector: Option<Arc<ModeSelector>>,
    ) -> Self {
        Self {
            response,
            frontier,
            dataset,
            selector,
        }
    }

    /// A context backed by fresh in-memory stores, for exercising handlers
    /// outside a crawl
    pub fn detached(response: Response) -> Self {
        Self::new(
            response,
            Arc::new(RequestFrontier::in_memory()),
            Arc::new(Dataset::in_memory()),
            None,
        )
    }

    pub fn request(&self) -> &Request {
        self.response.request()
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn html(&self) -> &HtmlView {
        self.response.html()
    }

    pub fn json(&self) -> Option<&Value> {
        self.response.json()
    }

    /// Metadata attached to the request when it was created
    pub fn metadata(&self) -> &Map<String, Value> {
        self.request().metadata()
    }

    pub fn frontier(&self) -> &RequestFrontier {
        &self.frontier
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// Queues a GET request for `url`
    pub fn enqueue(&self, url: &str) -> crate::Result<bool> {
        self.enqueue_request(Request::new(url)?)
    }

    pub fn enqueue_request(&self, request: Request) -> crate::Result<bool> {
        Ok(self.frontier.add(request)?)
    }

    /// Queues every link on the page, resolved against the effective URL
    ///
    /// # Returns
    ///
    /// The number of requests queued
    pub fn enqueue_links(&self) -> crate::Result<usize> {
        self.enqueue_links_where(|_| true)
    }

    /// Queues the page links that match `pattern`
    pub fn enqueue_links_matching(&self, pattern: &UrlPattern) -> crate::Result<usize> {
        self.enqueue_links_where(|link| pattern.matches(link))
    }

    fn enqueue_links_where(&self, keep: impl Fn(&str) -> bool) -> crate::Result<usize> {
        let mut queued = 0;
        for link in self.html().links.iter().filter(|link| keep(link)) {
            match Request::new(link) {
                Ok(request) => {
                    if self.frontier.add(request)? {
                        queued += 1;
                    }
                }
                Err(e) => debug!("Skipping link {}: {}", link, e),
            }
        }
        debug!("Queued {} links from {}", queued, self.response.url());
        Ok(queued)
    }

    /// Saves a record to the dataset
    ///
    /// Objects are stored as-is; any other value is stored under `"value"`.
    pub fn save_data(&self, data: impl Serialize) -> crate::Result<Record> {
        let data = match serde_json::to_value(data).map_err(crate::storage::StorageError::from)? {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        Ok(self.dataset.push(data)?)
    }

    /// Marks URLs matching `pattern` as servable by the light fetcher
    ///
    /// # Returns
    ///
    /// `false` when the crawl is not adaptive or the pattern is already known
    pub fn add_light_pattern(&self, pattern: impl Into<UrlPattern>) -> bool {
        self.selector
            .as_ref()
            .map(|selector| selector.add_light_pattern(pattern))
            .unwrap_or(false)
    }

    /// Marks URLs matching `pattern` as needing the heavy fetcher
    pub fn add_heavy_pattern(&self, pattern: impl Into<UrlPattern>) -> bool {
        self.selector
            .as_ref()
            .map(|selector| selector.add_heavy_pattern(pattern))
            .unwrap_or(false)
    }
}
