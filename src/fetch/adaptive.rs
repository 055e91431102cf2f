//! Adaptive mode selection
//!
//! The [`ModeSelector`] keeps two ordered pattern lists, "needs heavy" and
//! "light is enough", and answers which fetch path a URL should take.
//! [`AdaptiveFetcher`] consults it before every fetch, escalates light
//! responses that look unrendered to the heavy fetcher, and feeds every
//! success back into the lists.

use crate::config::AdaptiveConfig;
use crate::fetch::{FetchMode, Fetcher};
use crate::model::{Request, Response};
use crate::session::Cookie;
use crate::url::{derived_pattern, UrlPattern};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};
use url::Url;

/// Substrings that suggest a page builds its content with scripts
const RENDERING_INDICATORS: &[&str] = &[
    "window.onload",
    "document.ready",
    "vue",
    "react",
    "angular",
    "loading...",
    "please enable javascript",
    "please wait",
    "content is loading",
];

/// Whether an HTML body looks like it needs a rendering engine
///
/// True when any of these hold:
/// 1. More than `max_script_blocks` `<script>` elements
/// 2. The lower-cased body contains a known client-side rendering marker
/// 3. The visible text is shorter than `min_text_length` characters
pub fn needs_heavy_rendering(response: &Response, config: &AdaptiveConfig) -> bool {
    let view = response.html();

    if view.script_count > config.max_script_blocks {
        return true;
    }

    let body = response.text().to_lowercase();
    if RENDERING_INDICATORS
        .iter()
        .any(|indicator| body.contains(indicator))
    {
        return true;
    }

    view.text.chars().count() < config.min_text_length
}

#[derive(Debug, Default)]
struct PatternCache {
    heavy: Vec<UrlPattern>,
    light: Vec<UrlPattern>,
}

impl PatternCache {
    fn list_mut(&mut self, mode: FetchMode) -> &mut Vec<UrlPattern> {
        match mode {
            FetchMode::Heavy => &mut self.heavy,
            FetchMode::Light => &mut self.light,
        }
    }
}

/// Current contents of both pattern lists
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatternSnapshot {
    pub heavy: Vec<String>,
    pub light: Vec<String>,
}

/// Learned URL-to-mode cache
#[derive(Debug)]
pub struct ModeSelector {
    patterns: Mutex<PatternCache>,
    config: AdaptiveConfig,
}

impl ModeSelector {
    pub fn new(config: AdaptiveConfig) -> Self {
        Self {
            patterns: Mutex::new(PatternCache::default()),
            config,
        }
    }

    fn patterns_lock(&self) -> MutexGuard<'_, PatternCache> {
        self.patterns.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Picks the fetch path for `url`
    ///
    /// Heavy patterns are checked first, so a URL matching both lists is
    /// fetched heavy. Unknown URLs default to light.
    pub fn select_mode(&self, url: &str) -> FetchMode {
        match self.matching_pattern(url) {
            Some((mode, pattern)) => {
                debug!("{} matches {} pattern {}", url, mode, pattern);
                mode
            }
            None => FetchMode::Light,
        }
    }

    /// The first learned pattern matching `url`, heavy list first
    pub fn matching_pattern(&self, url: &str) -> Option<(FetchMode, UrlPattern)> {
        let patterns = self.patterns_lock();

        if let Some(pattern) = patterns.heavy.iter().find(|p| p.matches(url)) {
            return Some((FetchMode::Heavy, pattern.clone()));
        }
        patterns
            .light
            .iter()
            .find(|p| p.matches(url))
            .map(|pattern| (FetchMode::Light, pattern.clone()))
    }

    /// Adds a pattern to one list unless an equal pattern is already there
    ///
    /// # Returns
    ///
    /// `true` if the pattern was added
    pub fn add_pattern(&self, mode: FetchMode, pattern: impl Into<UrlPattern>) -> bool {
        let pattern = pattern.into();
        let mut patterns = self.patterns_lock();
        let list = patterns.list_mut(mode);

        if list.contains(&pattern) {
            return false;
        }

        debug!("Recording {} pattern {}", mode, pattern);
        list.push(pattern);
        true
    }

    pub fn add_heavy_pattern(&self, pattern: impl Into<UrlPattern>) -> bool {
        self.add_pattern(FetchMode::Heavy, pattern)
    }

    pub fn add_light_pattern(&self, pattern: impl Into<UrlPattern>) -> bool {
        self.add_pattern(FetchMode::Light, pattern)
    }

    /// Remembers that `url` was served successfully through `mode`
    pub fn record_success(&self, url: &Url, mode: FetchMode) -> bool {
        self.add_pattern(mode, derived_pattern(url))
    }

    /// Whether a light response should be retried through the heavy path
    ///
    /// Only HTML responses are considered, and only failures unless
    /// `escalate-on-success` is enabled.
    pub fn should_escalate(&self, response: &Response) -> bool {
        if !response.is_html() {
            return false;
        }
        if response.is_success() && !self.config.escalate_on_success {
            return false;
        }
        needs_heavy_rendering(response, &self.config)
    }

    pub fn patterns(&self) -> PatternSnapshot {
        let patterns = self.patterns_lock();
        PatternSnapshot {
            heavy: patterns.heavy.iter().map(|p| p.to_string()).collect(),
            light: patterns.light.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Fetcher that routes each request to a light or a heavy fetcher
pub struct AdaptiveFetcher {
    light: Arc<dyn Fetcher>,
    heavy: Arc<dyn Fetcher>,
    selector: Arc<ModeSelector>,
}

impl AdaptiveFetcher {
    pub fn new(light: Arc<dyn Fetcher>, heavy: Arc<dyn Fetcher>, config: AdaptiveConfig) -> Self {
        Self {
            light,
            heavy,
            selector: Arc::new(ModeSelector::new(config)),
        }
    }

    pub fn selector(&self) -> Arc<ModeSelector> {
        Arc::clone(&self.selector)
    }

    fn fetcher_for(&self, mode: FetchMode) -> &dyn Fetcher {
        match mode {
            FetchMode::Light => self.light.as_ref(),
            FetchMode::Heavy => self.heavy.as_ref(),
        }
    }
}

#[async_trait]
impl Fetcher for AdaptiveFetcher {
    /// The path taken for URLs with no learned pattern
    fn mode(&self) -> FetchMode {
        FetchMode::Light
    }

    async fn execute(&self, request: &Request) -> Response {
        let mut served_by = self.selector.select_mode(request.url().as_str());
        let mut response = self.fetcher_for(served_by).execute(request).await;

        if served_by == FetchMode::Light && self.selector.should_escalate(&response) {
            info!(
                "{} looks script-rendered (status {}), retrying heavy",
                request.url(),
                response.status()
            );
            self.selector.add_heavy_pattern(derived_pattern(request.url()));
            served_by = FetchMode::Heavy;
            response = self.heavy.execute(request).await;
        }

        if response.is_success() {
            self.selector.record_success(request.url(), served_by);
        }

        response
    }

    fn extract_cookies(&self, response: &Response) -> Vec<Cookie> {
        self.fetcher_for(response.mode()).extract_cookies(response)
    }

    fn extract_headers(&self, response: &Response) -> BTreeMap<String, String> {
        self.fetcher_for(response.mode()).extract_headers(response)
    }

    fn mode_selector(&self) -> Option<Arc<ModeSelector>> {
        Some(self.selector())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CannedFetcher {
        mode: FetchMode,
        status: u16,
        body: String,
        calls: AtomicUsize,
    }

    impl CannedFetcher {
        fn new(mode: FetchMode, status: u16, body: &str) -> Arc<Self> {
            Arc::new(Self {
                mode,
                status,
                body: body.to_string(),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for CannedFetcher {
        fn mode(&self) -> FetchMode {
            self.mode
        }

        async fn execute(&self, request: &Request) -> Response {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Response::builder(request.clone(), self.status)
                .header("Content-Type", "text/html; charset=utf-8")
                .body(self.body.clone())
                .mode(self.mode)
                .build()
        }
    }

    fn html_response(status: u16, body: &str) -> Response {
        let request = Request::new("https://example.com/app").unwrap();
        Response::builder(request, status)
            .header("Content-Type", "text/html")
            .body(body.to_string())
            .build()
    }

    fn long_text() -> String {
        "word ".repeat(300)
    }

    #[test]
    fn test_heuristic_script_count() {
        let config = AdaptiveConfig::default();
        let scripts = "<script></script>".repeat(6);
        let body = format!("<html><body>{}<p>{}</p></body></html>", scripts, long_text());
        assert!(needs_heavy_rendering(&html_response(200, &body), &config));

        let scripts = "<script></script>".repeat(5);
        let body = format!("<html><body>{}<p>{}</p></body></html>", scripts, long_text());
        assert!(!needs_heavy_rendering(&html_response(200, &body), &config));
    }

    #[test]
    fn test_heuristic_indicator() {
        let config = AdaptiveConfig::default();
        let body = format!(
            "<html><body><p>{}</p><p>Please Enable JavaScript</p></body></html>",
            long_text()
        );
        assert!(needs_heavy_rendering(&html_response(200, &body), &config));
    }

    #[test]
    fn test_heuristic_short_text() {
        let config = AdaptiveConfig::default();
        assert!(needs_heavy_rendering(
            &html_response(200, "<html><body><div id=root></div></body></html>"),
            &config
        ));
    }

    #[test]
    fn test_should_escalate_only_failures_by_default() {
        let selector = ModeSelector::new(AdaptiveConfig::default());
        let thin = "<html><body><div id=app></div></body></html>";

        assert!(selector.should_escalate(&html_response(403, thin)));
        assert!(!selector.should_escalate(&html_response(200, thin)));

        let eager = ModeSelector::new(AdaptiveConfig {
            escalate_on_success: true,
            ..AdaptiveConfig::default()
        });
        assert!(eager.should_escalate(&html_response(200, thin)));
    }

    #[test]
    fn test_should_escalate_ignores_non_html() {
        let selector = ModeSelector::new(AdaptiveConfig::default());
        let request = Request::new("https://example.com/api").unwrap();
        let response = Response::builder(request, 500)
            .header("Content-Type", "application/json")
            .body("{}")
            .build();
        assert!(!selector.should_escalate(&response));
    }

    #[test]
    fn test_select_mode_defaults_light() {
        let selector = ModeSelector::new(AdaptiveConfig::default());
        assert_eq!(selector.select_mode("https://example.com/"), FetchMode::Light);
    }

    #[test]
    fn test_heavy_wins_over_light() {
        let selector = ModeSelector::new(AdaptiveConfig::default());
        selector.add_light_pattern("example.com");
        assert_eq!(
            selector.select_mode("https://example.com/app/x"),
            FetchMode::Light
        );

        selector.add_heavy_pattern("example.com/app");
        assert_eq!(
            selector.select_mode("https://example.com/app/x"),
            FetchMode::Heavy
        );
        assert_eq!(
            selector.select_mode("https://example.com/blog"),
            FetchMode::Light
        );
    }

    #[test]
    fn test_matching_pattern_checks_heavy_then_light() {
        let selector = ModeSelector::new(AdaptiveConfig::default());
        assert!(selector.matching_pattern("https://example.com/docs/1").is_none());

        selector.add_light_pattern("example.com/docs");
        let (mode, pattern) = selector
            .matching_pattern("https://example.com/docs/1")
            .unwrap();
        assert_eq!(mode, FetchMode::Light);
        assert_eq!(pattern.as_str(), "example.com/docs");

        selector.add_heavy_pattern("example.com/docs/1");
        let (mode, pattern) = selector
            .matching_pattern("https://example.com/docs/1")
            .unwrap();
        assert_eq!(mode, FetchMode::Heavy);
        assert_eq!(pattern.as_str(), "example.com/docs/1");
        assert_eq!(
            selector.select_mode("https://example.com/docs/2"),
            FetchMode::Light
        );
    }

    #[test]
    fn test_regex_patterns() {
        let selector = ModeSelector::new(AdaptiveConfig::default());
        selector.add_heavy_pattern(UrlPattern::regex(r"/dashboard/\d+").unwrap());
        assert_eq!(
            selector.select_mode("https://example.com/dashboard/7"),
            FetchMode::Heavy
        );
    }

    #[test]
    fn test_patterns_are_deduplicated() {
        let selector = ModeSelector::new(AdaptiveConfig::default());
        assert!(selector.add_light_pattern("example.com/a"));
        assert!(!selector.add_light_pattern("example.com/a"));
        assert!(selector.add_heavy_pattern("example.com/a"));

        let snapshot = selector.patterns();
        assert_eq!(snapshot.light, vec!["example.com/a"]);
        assert_eq!(snapshot.heavy, vec!["example.com/a"]);
    }

    #[tokio::test]
    async fn test_light_success_records_light_pattern() {
        let body = format!("<html><body><p>{}</p></body></html>", long_text());
        let light = CannedFetcher::new(FetchMode::Light, 200, &body);
        let heavy = CannedFetcher::new(FetchMode::Heavy, 200, &body);
        let fetcher = AdaptiveFetcher::new(light.clone(), heavy.clone(), AdaptiveConfig::default());

        let request = Request::new("https://example.com/docs/intro/start").unwrap();
        let response = fetcher.execute(&request).await;

        assert_eq!(response.mode(), FetchMode::Light);
        assert_eq!(light.calls(), 1);
        assert_eq!(heavy.calls(), 0);
        assert_eq!(
            fetcher.selector().patterns().light,
            vec!["example.com/docs/intro"]
        );
    }

    #[tokio::test]
    async fn test_unrendered_failure_escalates_to_heavy() {
        let light = CannedFetcher::new(
            FetchMode::Light,
            403,
            "<html><body>Please enable JavaScript</body></html>",
        );
        let body = format!("<html><body><p>{}</p></body></html>", long_text());
        let heavy = CannedFetcher::new(FetchMode::Heavy, 200, &body);
        let fetcher = AdaptiveFetcher::new(light.clone(), heavy.clone(), AdaptiveConfig::default());

        let request = Request::new("https://spa.example.com/app/home").unwrap();
        let response = fetcher.execute(&request).await;

        assert_eq!(response.status(), 200);
        assert_eq!(response.mode(), FetchMode::Heavy);
        assert_eq!(light.calls(), 1);
        assert_eq!(heavy.calls(), 1);
        assert_eq!(
            fetcher.selector().patterns().heavy,
            vec!["spa.example.com/app/home"]
        );

        // Sibling pages now go straight to the heavy fetcher
        let sibling = Request::new("https://spa.example.com/app/home/settings").unwrap();
        fetcher.execute(&sibling).await;
        assert_eq!(light.calls(), 1);
        assert_eq!(heavy.calls(), 2);
    }

    #[tokio::test]
    async fn test_plain_failure_is_not_escalated() {
        let body = format!("<html><body><p>{}</p></body></html>", long_text());
        let light = CannedFetcher::new(FetchMode::Light, 500, &body);
        let heavy = CannedFetcher::new(FetchMode::Heavy, 200, &body);
        let fetcher = AdaptiveFetcher::new(light.clone(), heavy.clone(), AdaptiveConfig::default());

        let request = Request::new("https://example.com/down").unwrap();
        let response = fetcher.execute(&request).await;

        assert_eq!(response.status(), 500);
        assert_eq!(heavy.calls(), 0);
        assert!(fetcher.selector().patterns().light.is_empty());
    }
}
