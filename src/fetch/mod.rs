//! Fetchers: the shared contract plus the HTTP and browser implementations
//!
//! Both fetchers honour the same request/outcome shape so the crawl engine
//! can select a variant explicitly and fall back from one to the other.
//! Saved bytes always land via an atomic rename from a temporary sibling so
//! a partially written file is never visible at its final path.

pub mod browser;
pub mod decode;
pub mod heuristics;
pub mod http;
pub mod links;

pub use browser::BrowserFetcher;
pub use http::HttpFetcher;

use anyhow::{Context, Result};
use md5::{Digest, Md5};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::index::FetchStatus;
use crate::urlutil::{MappedPath, ensure_contained};

/// Inputs for a single fetch attempt.
pub struct FetchRequest<'a> {
    /// Canonical URL to fetch.
    pub url: &'a Url,
    /// Extension-less target mapping; the fetcher appends the extension
    /// chosen from the response Content-Type.
    pub target: &'a MappedPath,
    /// Directory the final path must stay inside; violations error before
    /// any write.
    pub allowed_base: &'a Path,
    pub timeout: Duration,
    pub max_body_size: u64,
}

/// Result of a single fetch attempt.
///
/// `detected_links` is populated by the browser fetcher (links come from
/// the live DOM); the HTTP fetcher returns the decoded body instead and the
/// engine extracts links after the fetch permit is released.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    pub status: Option<FetchStatus>,
    pub http_status: Option<u16>,
    pub content_hash: Option<String>,
    pub local_path: Option<PathBuf>,
    pub detected_links: Vec<String>,
    pub error_message: Option<String>,
    /// Decoded HTML body, kept for link extraction and the JS-shell check.
    pub body_html: Option<String>,
}

impl FetchOutcome {
    #[must_use]
    pub fn failure(status: FetchStatus, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            error_message: Some(message.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_http_status(mut self, http_status: Option<u16>) -> Self {
        self.http_status = http_status;
        self
    }

    /// The finalised status; defaults to `failed_other` if a code path
    /// forgot to set one.
    #[must_use]
    pub fn status(&self) -> FetchStatus {
        self.status.unwrap_or(FetchStatus::FailedOther)
    }
}

/// MD5 digest of saved bytes, hex encoded, as recorded in the index.
#[must_use]
pub fn content_md5(bytes: &[u8]) -> String {
    let digest = Md5::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Prefix used for in-flight temporary files; the engine sweeps leftovers
/// matching it after a cancelled run.
pub const TMP_PREFIX: &str = ".docscrape-tmp-";

/// Write bytes to `target` atomically via a uniquely named sibling.
///
/// # Errors
///
/// Returns an error when the target escapes `allowed_base`, the parent
/// directory cannot be created, or the write/rename fails.
pub async fn save_atomic(bytes: &[u8], target: &Path, allowed_base: &Path) -> Result<()> {
    ensure_contained(target, allowed_base)?;
    let parent = target
        .parent()
        .context("target path has no parent directory")?;
    tokio::fs::create_dir_all(parent)
        .await
        .with_context(|| format!("creating content directory {}", parent.display()))?;

    let file_name = target
        .file_name()
        .context("target path has no file name")?
        .to_string_lossy();
    let tmp = parent.join(format!("{TMP_PREFIX}{}-{file_name}", uuid::Uuid::new_v4()));

    tokio::fs::write(&tmp, bytes)
        .await
        .with_context(|| format!("writing temporary file {}", tmp.display()))?;
    if let Err(e) = tokio::fs::rename(&tmp, target).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e).with_context(|| format!("renaming into place at {}", target.display()));
    }
    Ok(())
}

/// Remove leftover temporary files under a content root.
///
/// Used after cancellation, when an in-flight save may have been aborted
/// between the temporary write and the rename.
pub async fn sweep_temp_files(content_root: &Path) {
    let mut stack = vec![content_root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(mut entries) = tokio::fs::read_dir(&dir).await else {
            continue;
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path
                .file_name()
                .map(|n| n.to_string_lossy().starts_with(TMP_PREFIX))
                .unwrap_or(false)
            {
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    log::warn!("failed to remove temp file {}: {e}", path.display());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_matches_known_vector() {
        assert_eq!(content_md5(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(content_md5(b"abc"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[tokio::test]
    async fn save_atomic_creates_parents_and_writes() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("example.com").join("page-abc.html");
        save_atomic(b"<html></html>", &target, dir.path()).await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"<html></html>");
        // No temp files remain.
        let leftovers: Vec<_> = std::fs::read_dir(target.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with(TMP_PREFIX))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn save_atomic_rejects_escaping_targets() {
        let dir = tempfile::tempdir().unwrap();
        let outside = dir.path().parent().unwrap().join("escape.html");
        assert!(save_atomic(b"x", &outside, dir.path()).await.is_err());
    }

    #[tokio::test]
    async fn sweep_removes_only_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("example.com");
        std::fs::create_dir_all(&sub).unwrap();
        let keep = sub.join("page-abc.html");
        let stale = sub.join(format!("{TMP_PREFIX}1234-page-abc.html"));
        std::fs::write(&keep, b"k").unwrap();
        std::fs::write(&stale, b"t").unwrap();

        sweep_temp_files(dir.path()).await;
        assert!(keep.exists());
        assert!(!stale.exists());
    }
}
