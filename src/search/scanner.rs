//! Phase 1: keyword scan over decoded file contents
//!
//! Streams candidate files with bounded parallelism and keeps those whose
//! decoded text contains every keyword as a case-insensitive substring.
//! This phase does not parse HTML; it only narrows the candidate set for
//! the structural extractor.

use futures::future::join_all;
use log::{debug, warn};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::sync::Semaphore;

use crate::fetch::decode::decode_body;

/// How many files are read concurrently.
const SCAN_CONCURRENCY: usize = 4;

/// Per-file read cap; larger files are scanned only up to this point.
const SCAN_READ_CAP: u64 = 5 * 1024 * 1024;

/// Case-insensitive conjunction check. Empty keyword lists (after dropping
/// blanks) are vacuously true.
#[must_use]
pub fn contains_all_keywords(text: &str, lowered_keywords: &[String]) -> bool {
    let text_lower = text.to_lowercase();
    lowered_keywords.iter().all(|kw| text_lower.contains(kw))
}

/// Lower-case keywords and drop blanks, keeping the caller's order.
#[must_use]
pub fn normalize_keywords(keywords: &[String]) -> Vec<String> {
    keywords
        .iter()
        .map(|kw| kw.trim().to_lowercase())
        .filter(|kw| !kw.is_empty())
        .collect()
}

/// Return the subset of `paths` whose contents match every keyword, in the
/// caller's order. Unreadable files are logged and skipped; they never
/// fail the scan.
pub async fn scan_files_for_keywords(paths: &[PathBuf], keywords: &[String]) -> Vec<PathBuf> {
    let lowered = normalize_keywords(keywords);
    if lowered.is_empty() {
        // Vacuous conjunction: every file matches.
        return paths.to_vec();
    }

    let semaphore = Arc::new(Semaphore::new(SCAN_CONCURRENCY));
    let lowered = Arc::new(lowered);

    let scans = paths.iter().map(|path| {
        let semaphore = Arc::clone(&semaphore);
        let lowered = Arc::clone(&lowered);
        let path = path.clone();
        async move {
            let Ok(_permit) = semaphore.acquire().await else {
                return None;
            };
            match read_capped(&path).await {
                Ok(bytes) => {
                    let text = decode_body(&bytes, None);
                    if contains_all_keywords(&text, &lowered) {
                        debug!("keywords matched in {}", path.display());
                        Some(path)
                    } else {
                        None
                    }
                }
                Err(e) => {
                    warn!("skipping unreadable file {}: {e}", path.display());
                    None
                }
            }
        }
    });

    // join_all preserves input order, which the coordinator relies on for
    // stable result ordering.
    join_all(scans).await.into_iter().flatten().collect()
}

async fn read_capped(path: &std::path::Path) -> std::io::Result<Vec<u8>> {
    let file = tokio::fs::File::open(path).await?;
    let mut bytes = Vec::new();
    file.take(SCAN_READ_CAP).read_to_end(&mut bytes).await?;
    Ok(bytes)
}
