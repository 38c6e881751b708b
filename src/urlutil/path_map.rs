//! Canonical URL to local path mapping
//!
//! Content files live at `<content_root>/<authority>/<slug>-<hash>.<ext>`.
//! The slug is a flattened, filesystem-safe rendering of the URL path for
//! human browsing; the hash suffix (48 bits of the canonical URL's SHA-256)
//! is the actual no-clobber key, so two URLs can never collide on the same
//! local path. The extension is chosen from the Content-Type after fetch.

use anyhow::{Result, anyhow};
use percent_encoding::percent_decode_str;
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use url::Url;

use super::canonical::authority;

/// Hex characters of the canonical-URL digest kept in the filename.
const HASH_LEN: usize = 12;

/// Ceiling for the human-readable slug component.
const MAX_SLUG_LEN: usize = 150;

/// Extensions a mapped path may carry, in probe order.
const KNOWN_EXTS: [&str; 3] = ["html", "pdf", "bin"];

/// File extension for a Content-Type header value.
#[must_use]
pub fn ext_for_content_type(content_type: Option<&str>) -> &'static str {
    match content_type {
        Some(ct) if ct.starts_with("text/html") => "html",
        Some(ct) if ct.starts_with("application/pdf") => "pdf",
        _ => "bin",
    }
}

/// The extension-less mapping of one canonical URL into a content root.
///
/// The extension depends on the response Content-Type, which is unknown
/// until fetch time, so the mapping is split: [`MappedPath::with_ext`]
/// produces the final path and [`MappedPath::existing`] probes the known
/// extensions for a previously saved file.
#[derive(Debug, Clone)]
pub struct MappedPath {
    dir: PathBuf,
    stem: String,
}

impl MappedPath {
    #[must_use]
    pub fn new(content_root: &Path, url: &Url) -> Self {
        let host_dir = sanitize_component(&authority(url));
        let slug = slug_for(url);
        let hash = short_hash(url.as_str());
        Self {
            dir: content_root.join(host_dir),
            stem: format!("{slug}-{hash}"),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn with_ext(&self, ext: &str) -> PathBuf {
        self.dir.join(format!("{}.{ext}", self.stem))
    }

    /// Path of an already saved file for this URL, if any extension exists.
    #[must_use]
    pub fn existing(&self) -> Option<PathBuf> {
        KNOWN_EXTS
            .iter()
            .map(|ext| self.with_ext(ext))
            .find(|p| p.is_file())
    }
}

fn slug_for(url: &Url) -> String {
    let decoded = percent_decode_str(url.path()).decode_utf8_lossy();
    let slug: String = decoded
        .split('/')
        .filter(|seg| !seg.is_empty())
        .map(sanitize_component)
        .collect::<Vec<_>>()
        .join("-");
    let slug = if slug.is_empty() {
        "index".to_string()
    } else {
        slug
    };
    // Byte truncation is fine: sanitisation already reduced to ASCII.
    slug.chars().take(MAX_SLUG_LEN).collect()
}

fn sanitize_component(part: &str) -> String {
    part.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn short_hash(canonical_url: &str) -> String {
    let digest = Sha256::digest(canonical_url.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex[..HASH_LEN].to_string()
}

/// Reject paths that escape the allowed base directory.
///
/// Purely lexical: the target must contain no parent-directory components
/// and must start with the base. Callers pass absolute paths (the config
/// builder normalises the storage root).
///
/// # Errors
///
/// Returns an error when the path lies outside `base`.
pub fn ensure_contained(target: &Path, base: &Path) -> Result<()> {
    if target
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(anyhow!(
            "target path {} contains parent-directory components",
            target.display()
        ));
    }
    if !target.starts_with(base) {
        return Err(anyhow!(
            "target path {} escapes allowed base {}",
            target.display(),
            base.display()
        ));
    }
    Ok(())
}
