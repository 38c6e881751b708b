//! Two-phase search over a finished job's archive
//!
//! Reads the job index, restricts to successful fetches, narrows with the
//! keyword scanner, extracts with the structural extractor, and joins
//! results back to their originating URLs. Results are ordered by index
//! order of the candidate file, then in-document order of the match.

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use super::errors::{SearchError, SearchResult};
use super::extractor::{extract_text_with_selector, validate_selector};
use super::scanner::{normalize_keywords, scan_files_for_keywords};
use crate::config::StorageLayout;
use crate::fetch::decode::decode_body;
use crate::index::{FetchStatus, read_index};

/// One search request against a job's archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub job_id: String,
    pub scan_keywords: Vec<String>,
    pub selector: String,
    #[serde(default)]
    pub extract_keywords: Vec<String>,
}

/// One extracted fragment, joined back to its source URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResultItem {
    pub original_url: String,
    pub extracted_text: String,
    pub selector_matched: String,
}

/// Run a search against the index and content of one job.
///
/// # Errors
///
/// `JobNotFound` when the job has no index file, `InvalidSelector` for a
/// malformed selector (checked before any file is read), and `Io` when
/// the index itself cannot be read.
pub async fn perform_search(
    layout: &StorageLayout,
    request: &SearchRequest,
) -> SearchResult<Vec<SearchResultItem>> {
    validate_selector(&request.selector)?;

    // Ids outside the job alphabet cannot name an index file; treating them
    // as unknown also keeps crafted ids from escaping the index directory.
    if request.job_id.is_empty()
        || !request
            .job_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(SearchError::JobNotFound(request.job_id.clone()));
    }

    let index_path = layout.index_path(&request.job_id);
    if !index_path.is_file() {
        return Err(SearchError::JobNotFound(request.job_id.clone()));
    }

    let records = read_index(&index_path)
        .await
        .map_err(|e| SearchError::Other(format!("{e:#}")))?;

    // Successful fetches only, keeping index order; the map joins each
    // candidate path back to its originating URL.
    let mut url_by_path: HashMap<PathBuf, String> = HashMap::new();
    let mut successful: Vec<PathBuf> = Vec::new();
    for record in records {
        if record.fetch_status != FetchStatus::Success || record.local_path.is_empty() {
            continue;
        }
        let path = PathBuf::from(&record.local_path);
        if !path.starts_with(layout.root()) {
            log::warn!(
                "indexed path {} lies outside the storage root, skipping",
                record.local_path
            );
            continue;
        }
        if !path.is_file() {
            debug!("indexed file missing on disk: {}", record.local_path);
            continue;
        }
        if url_by_path
            .insert(path.clone(), record.original_url)
            .is_none()
        {
            successful.push(path);
        }
    }
    info!(
        "search {}: {} successful files in index",
        request.job_id,
        successful.len()
    );
    if successful.is_empty() {
        return Ok(Vec::new());
    }

    let candidates = scan_files_for_keywords(&successful, &request.scan_keywords).await;
    debug!(
        "search {}: {} candidates after keyword scan",
        request.job_id,
        candidates.len()
    );

    let extract_keywords = normalize_keywords(&request.extract_keywords);
    let mut results = Vec::new();
    for path in candidates {
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("cannot read candidate {}: {e}", path.display());
                continue;
            }
        };
        let html = decode_body(&bytes, None);
        let snippets = extract_text_with_selector(&html, &request.selector, &extract_keywords)?;
        if snippets.is_empty() {
            continue;
        }
        let Some(original_url) = url_by_path.get(&path) else {
            continue;
        };
        for snippet in snippets {
            results.push(SearchResultItem {
                original_url: original_url.clone(),
                extracted_text: snippet,
                selector_matched: request.selector.clone(),
            });
        }
    }

    info!("search {}: {} results", request.job_id, results.len());
    Ok(results)
}
