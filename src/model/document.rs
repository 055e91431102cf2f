//! Parsed document view of an HTML response
//!
//! The view is a frozen snapshot taken once per response:
//! - Page title
//! - Visible body text (script and style contents excluded)
//! - Absolute links from `<a href>` tags
//! - Number of `<script>` blocks

use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Extracted information from an HTML body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HtmlView {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Body text with whitespace collapsed to single spaces
    pub text: String,

    /// All followable links found on the page (absolute URLs)
    pub links: Vec<String>,

    /// Number of `<script>` elements anywhere in the document
    pub script_count: usize,
}

impl HtmlView {
    /// Parses HTML content into a view
    ///
    /// # Link Extraction Rules
    ///
    /// **Include:** `<a href="...">` tags, resolved against `base_url`
    ///
    /// **Exclude:**
    /// - `<a href="..." download>`
    /// - `javascript:`, `mailto:`, `tel:` links and data URIs
    /// - Fragment-only links
    /// - Non-HTTP(S) URLs after resolution
    ///
    /// # Example
    ///
    /// ```
    /// use sumi_harvest::model::HtmlView;
    /// use url::Url;
    ///
    /// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
    /// let base_url = Url::parse("https://example.com/").unwrap();
    /// let view = HtmlView::parse(html, &base_url);
    /// assert_eq!(view.title, Some("Test".to_string()));
    /// assert_eq!(view.links, vec!["https://example.com/page".to_string()]);
    /// ```
    pub fn parse(html: &str, base_url: &Url) -> Self {
        let document = Html::parse_document(html);

        Self {
            title: extract_title(&document),
            text: extract_body_text(&document),
            links: extract_links(&document, base_url),
            script_count: count_scripts(&document),
        }
    }
}

fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_body_text(document: &Html) -> String {
    let Ok(body_selector) = Selector::parse("body") else {
        return String::new();
    };

    let mut words: Vec<&str> = Vec::new();
    for body in document.select(&body_selector) {
        for node in body.descendants() {
            let Some(text) = node.value().as_text() else {
                continue;
            };

            let in_code = node
                .parent()
                .and_then(ElementRef::wrap)
                .map(|parent| matches!(parent.value().name(), "script" | "style" | "noscript"))
                .unwrap_or(false);

            if !in_code {
                words.extend(text.split_whitespace());
            }
        }
    }

    words.join(" ")
}

fn extract_links(document: &Html, base_url: &Url) -> Vec<String> {
    let mut links = Vec::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in document.select(&a_selector) {
            if element.value().attr("download").is_some() {
                continue;
            }

            if let Some(absolute_url) = element
                .value()
                .attr("href")
                .and_then(|href| resolve_link(href, base_url))
            {
                links.push(absolute_url);
            }
        }
    }

    links
}

fn count_scripts(document: &Html) -> usize {
    Selector::parse("script")
        .map(|selector| document.select(&selector).count())
        .unwrap_or(0)
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None for special schemes, fragment-only links, unparseable
/// links, and anything that does not resolve to HTTP(S).
pub fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) if matches!(absolute_url.scheme(), "http" | "https") => {
            Some(absolute_url.to_string())
        }
        _ => None,
    }
}
