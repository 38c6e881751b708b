//! URL canonicalisation
//!
//! Produces the single canonical form used as the key for the visited set,
//! the index, and path mapping. Rules, in order: scheme and host lowercased,
//! default ports stripped, fragment removed, path segments percent-decoded
//! and re-encoded with one canonical alphabet, trailing slash preserved,
//! query preserved verbatim, `.`/`..` segments resolved.

use anyhow::{Result, anyhow};
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use url::Url;

/// Characters percent-encoded inside a canonical path segment.
///
/// `%` is included so a literal percent survives the decode/re-encode round
/// trip, and `/` so an encoded slash cannot turn into a path separator.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'\\')
    .add(b'^')
    .add(b'|');

/// Canonicalise a URL string.
///
/// `url::Url` already lowercases the scheme and host, strips default ports,
/// and resolves `.`/`..` during parsing; this adds fragment removal and the
/// canonical percent-encoding of path segments.
///
/// # Errors
///
/// Returns an error for unparseable URLs, non-http(s) schemes, and URLs
/// without a host.
pub fn canonicalize(input: &str) -> Result<Url> {
    let mut url = Url::parse(input.trim()).map_err(|e| anyhow!("invalid URL '{input}': {e}"))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(anyhow!("unsupported scheme '{}'", url.scheme()));
    }
    if url.host_str().is_none() {
        return Err(anyhow!("URL '{input}' has no host"));
    }

    url.set_fragment(None);

    // Re-encode each path segment with the canonical alphabet. Splitting on
    // '/' keeps empty trailing segments, so a trailing slash survives.
    let canonical_path = {
        let path = url.path();
        let segments: Vec<String> = path
            .trim_start_matches('/')
            .split('/')
            .map(|seg| {
                let decoded = percent_decode_str(seg).decode_utf8_lossy();
                utf8_percent_encode(&decoded, SEGMENT).to_string()
            })
            .collect();
        format!("/{}", segments.join("/"))
    };
    url.set_path(&canonical_path);

    Ok(url)
}

/// The `host[:port]` authority of a canonical URL.
#[must_use]
pub fn authority(url: &Url) -> String {
    match url.port() {
        Some(port) => format!("{}:{port}", url.host_str().unwrap_or_default()),
        None => url.host_str().unwrap_or_default().to_string(),
    }
}

/// Resolve a discovered link against its page and canonicalise it.
///
/// Returns `None` for unparseable links and non-http(s) schemes; those are
/// not fetch candidates.
#[must_use]
pub fn resolve_link(base: &Url, link: &str) -> Option<Url> {
    let link = link.trim();
    if link.is_empty() {
        return None;
    }
    let joined = base.join(link).ok()?;
    canonicalize(joined.as_str()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_scheme_and_host() {
        let url = canonicalize("HTTP://Example.COM/Path").unwrap();
        assert_eq!(url.as_str(), "http://example.com/Path");
    }

    #[test]
    fn strips_default_ports_only() {
        assert_eq!(
            canonicalize("http://example.com:80/a").unwrap().as_str(),
            "http://example.com/a"
        );
        assert_eq!(
            canonicalize("https://example.com:443/a").unwrap().as_str(),
            "https://example.com/a"
        );
        assert_eq!(
            canonicalize("http://example.com:8080/a").unwrap().as_str(),
            "http://example.com:8080/a"
        );
    }

    #[test]
    fn removes_fragment_keeps_query() {
        let url = canonicalize("http://example.com/a?b=2&a=1#frag").unwrap();
        assert_eq!(url.as_str(), "http://example.com/a?b=2&a=1");
    }

    #[test]
    fn preserves_trailing_slash() {
        assert_eq!(
            canonicalize("http://example.com/docs/").unwrap().as_str(),
            "http://example.com/docs/"
        );
        assert_eq!(
            canonicalize("http://example.com/docs").unwrap().as_str(),
            "http://example.com/docs"
        );
    }

    #[test]
    fn resolves_dot_segments() {
        let url = canonicalize("http://example.com/a/b/../c/./d").unwrap();
        assert_eq!(url.as_str(), "http://example.com/a/c/d");
    }

    #[test]
    fn normalises_percent_encoding() {
        // Unreserved characters decode; reserved ones stay escaped.
        let url = canonicalize("http://example.com/%7Euser/a%20b").unwrap();
        assert_eq!(url.as_str(), "http://example.com/~user/a%20b");
        // An encoded slash must not become a separator.
        let url = canonicalize("http://example.com/a%2Fb").unwrap();
        assert_eq!(url.as_str(), "http://example.com/a%2Fb");
    }

    #[test]
    fn rejects_non_http_schemes() {
        assert!(canonicalize("ftp://example.com/a").is_err());
        assert!(canonicalize("mailto:user@example.com").is_err());
    }

    #[test]
    fn fragment_only_difference_is_same_key() {
        let a = canonicalize("http://example.com/a#one").unwrap();
        let b = canonicalize("http://example.com/a#two").unwrap();
        assert_eq!(a.as_str(), b.as_str());
    }

    #[test]
    fn authority_includes_non_default_port() {
        let url = canonicalize("http://example.com:8080/a").unwrap();
        assert_eq!(authority(&url), "example.com:8080");
        let url = canonicalize("http://example.com/a").unwrap();
        assert_eq!(authority(&url), "example.com");
    }

    #[test]
    fn resolve_link_joins_relative() {
        let base = canonicalize("http://example.com/docs/index.html").unwrap();
        let resolved = resolve_link(&base, "../api/ref.html").unwrap();
        assert_eq!(resolved.as_str(), "http://example.com/api/ref.html");
        assert!(resolve_link(&base, "javascript:void(0)").is_none());
    }
}
