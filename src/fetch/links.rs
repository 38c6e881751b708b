//! Candidate link extraction from HTML
//!
//! Collects `href` from anchors plus `src` from frames, iframes, and
//! scripts, resolves them against the page URL, and drops non-navigational
//! schemes. Duplicates within one page are removed here, before the engine
//! sees them.

use scraper::{Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Schemes that are never fetch candidates.
const SKIPPED_PREFIXES: [&str; 4] = ["javascript:", "mailto:", "data:", "tel:"];

/// Extract absolute candidate URLs from an HTML document.
#[must_use]
pub fn extract_links(html: &str, base: &Url) -> Vec<String> {
    let doc = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for (selector, attr) in [
        ("a[href]", "href"),
        ("frame[src], iframe[src]", "src"),
        ("script[src]", "src"),
    ] {
        // The selector strings are literals; parse cannot fail.
        let Ok(sel) = Selector::parse(selector) else {
            continue;
        };
        for element in doc.select(&sel) {
            let Some(raw) = element.value().attr(attr) else {
                continue;
            };
            let raw = raw.trim();
            if raw.is_empty()
                || raw.starts_with('#')
                || SKIPPED_PREFIXES
                    .iter()
                    .any(|p| raw.to_ascii_lowercase().starts_with(p))
            {
                continue;
            }
            let Ok(absolute) = base.join(raw) else {
                log::debug!("unresolvable link '{raw}' on {base}");
                continue;
            };
            if !matches!(absolute.scheme(), "http" | "https") {
                continue;
            }
            let absolute = absolute.to_string();
            if seen.insert(absolute.clone()) {
                links.push(absolute);
            }
        }
    }

    links
}
