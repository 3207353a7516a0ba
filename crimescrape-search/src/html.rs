//! Helpers for pulling data out of fetched content.
//!
//! Upstream JSON APIs arrive either raw (light engine) or wrapped in the
//! browser's `<pre>` viewer (stealth engine); [`parse_json`] accepts both.

use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

/// Parse JSON from raw content or from the first `<pre>` element of an HTML page.
///
/// Returns an empty JSON object when nothing parseable is found, so modules
/// can treat "no data" and "broken page" alike.
pub fn parse_json(content: &str) -> Value {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return empty_object();
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return value;
    }

    let document = Html::parse_document(content);
    let Ok(pre) = Selector::parse("pre") else {
        return empty_object();
    };
    document
        .select(&pre)
        .next()
        .map(|el| el.text().collect::<String>())
        .and_then(|text| serde_json::from_str(text.trim()).ok())
        .unwrap_or_else(empty_object)
}

/// Trimmed text of the first element under `root` matching `selector`.
///
/// Returns `None` for an invalid selector, no match, or an empty match.
pub fn select_text(root: ElementRef<'_>, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    let text = root
        .select(&selector)
        .next()?
        .text()
        .collect::<String>()
        .trim()
        .to_string();
    (!text.is_empty()).then_some(text)
}

/// Like [`select_text`], falling back to `default`.
pub fn extract_text(root: ElementRef<'_>, selector: &str, default: &str) -> String {
    select_text(root, selector).unwrap_or_else(|| default.to_string())
}

/// Value of `attr` on the first element under `root` matching `selector`.
pub fn select_attr(root: ElementRef<'_>, selector: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    root.select(&selector)
        .next()?
        .value()
        .attr(attr)
        .map(str::to_owned)
}

fn empty_object() -> Value {
    Value::Object(serde_json::Map::new())
}
