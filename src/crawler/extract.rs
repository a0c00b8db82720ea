//! Content extraction helpers for success hooks
//!
//! The request cycle only hands raw bytes to callers. These helpers cover the
//! common hook work of pulling text out of a page and turning a listing page
//! into follow-up tasks:
//! - Text of every element matching a CSS selector
//! - Page title
//! - Absolute http(s) links under a selector

use crate::GatherError;
use scraper::{Html, Selector};
use url::Url;

fn parse_selector(selector: &str) -> Result<Selector, GatherError> {
    Selector::parse(selector).map_err(|e| GatherError::InvalidSelector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

/// Returns the trimmed, non-empty text of every element matching `selector`
///
/// # Example
///
/// ```
/// use gatherer::crawler::extract_text;
///
/// let html = r#"<table><tr><td>1.0.1.0</td><td>1.0.3.255</td></tr></table>"#;
/// let cells = extract_text(html, "td").unwrap();
/// assert_eq!(cells, vec!["1.0.1.0", "1.0.3.255"]);
/// ```
pub fn extract_text(html: &str, selector: &str) -> Result<Vec<String>, GatherError> {
    let selector = parse_selector(selector)?;
    let document = Html::parse_document(html);

    Ok(document
        .select(&selector)
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
        .collect())
}

/// Extracts the page title
pub fn extract_title(html: &str) -> Option<String> {
    extract_text(html, "title").ok()?.into_iter().next()
}

/// Returns absolute http(s) URLs from `href` attributes of elements matching `selector`
///
/// Relative links are resolved against `base_url`. `javascript:`, `mailto:`,
/// `tel:`, `data:` and fragment-only links are skipped.
pub fn extract_links(html: &str, selector: &str, base_url: &Url) -> Result<Vec<String>, GatherError> {
    let selector = parse_selector(selector)?;
    let document = Html::parse_document(html);

    Ok(document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_link(href, base_url))
        .collect())
}

fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    const SKIPPED: [&str; 4] = ["javascript:", "mailto:", "tel:", "data:"];
    if SKIPPED.iter().any(|scheme| href.starts_with(scheme)) {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    matches!(absolute.scheme(), "http" | "https").then(|| absolute.to_string())
}
