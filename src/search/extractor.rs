//! Phase 2: structural extraction with a CSS selector
//!
//! Parses candidate HTML tolerantly and returns the whitespace-normalised
//! text of every element matching the selector, in document order,
//! optionally filtered by a keyword conjunction.

use scraper::{Html, Selector};

use super::errors::{SearchError, SearchResult};
use super::scanner::contains_all_keywords;

/// Validate a selector without extracting anything.
///
/// The coordinator calls this before touching any files so a malformed
/// selector surfaces as a client error with no side effects.
///
/// # Errors
///
/// Returns [`SearchError::InvalidSelector`] when parsing fails.
pub fn validate_selector(selector: &str) -> SearchResult<()> {
    Selector::parse(selector).map_err(|e| SearchError::InvalidSelector {
        selector: selector.to_string(),
        message: e.to_string(),
    })?;
    Ok(())
}

/// Extract the text of every element in `html` matching `selector`.
///
/// `extract_keywords` should already be lower-cased
/// (see [`super::scanner::normalize_keywords`]); when non-empty, only
/// matches containing every keyword survive.
///
/// # Errors
///
/// Returns [`SearchError::InvalidSelector`] when the selector cannot be
/// parsed.
pub fn extract_text_with_selector(
    html: &str,
    selector: &str,
    extract_keywords: &[String],
) -> SearchResult<Vec<String>> {
    let parsed = Selector::parse(selector).map_err(|e| SearchError::InvalidSelector {
        selector: selector.to_string(),
        message: e.to_string(),
    })?;

    let doc = Html::parse_document(html);
    let snippets = doc
        .select(&parsed)
        .map(|element| {
            element
                .text()
                .collect::<Vec<_>>()
                .join(" ")
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|text| {
            extract_keywords.is_empty() || contains_all_keywords(text, extract_keywords)
        })
        .collect();

    Ok(snippets)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head><title>T</title></head><body>
        <p>first paragraph with alpha</p>
        <div><p>second
            paragraph   with beta</p></div>
        <p>third with alpha and beta</p>
    </body></html>"#;

    #[test]
    fn extracts_matches_in_document_order() {
        let snippets = extract_text_with_selector(PAGE, "p", &[]).unwrap();
        assert_eq!(
            snippets,
            vec![
                "first paragraph with alpha",
                "second paragraph with beta",
                "third with alpha and beta",
            ]
        );
    }

    #[test]
    fn title_selector_extracts_title() {
        let snippets = extract_text_with_selector(PAGE, "title", &[]).unwrap();
        assert_eq!(snippets, vec!["T"]);
    }

    #[test]
    fn keyword_filter_applies_conjunction() {
        let keywords = vec!["alpha".to_string(), "beta".to_string()];
        let snippets = extract_text_with_selector(PAGE, "p", &keywords).unwrap();
        assert_eq!(snippets, vec!["third with alpha and beta"]);
    }

    #[test]
    fn no_match_is_empty_not_error() {
        let snippets = extract_text_with_selector(PAGE, "article", &[]).unwrap();
        assert!(snippets.is_empty());
    }

    #[test]
    fn nested_text_is_concatenated() {
        let html = "<div id='x'>a <span>b</span> c</div>";
        let snippets = extract_text_with_selector(html, "#x", &[]).unwrap();
        assert_eq!(snippets, vec!["a b c"]);
    }

    #[test]
    fn malformed_selector_is_a_client_error() {
        let err = extract_text_with_selector(PAGE, "p[", &[]).unwrap_err();
        assert!(err.is_client_error());
        assert!(validate_selector("div >").is_err());
        assert!(validate_selector("p").is_ok());
    }
}
