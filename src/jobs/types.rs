//! Job descriptors and status records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::FallbackPolicy;

/// What kind of acquisition a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    /// Recursive crawl with the HTTP fetcher first.
    Web,
    /// Recursive crawl starting with the browser fetcher.
    Browser,
    /// Git repository checkout.
    Repo,
}

/// Lifecycle state of a job. Exactly one terminal transition happens, to
/// `completed` or `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Snapshot of one job, as returned to status queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub kind: JobKind,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl JobRecord {
    #[must_use]
    pub fn pending(id: String, kind: JobKind) -> Self {
        Self {
            id,
            kind,
            status: JobStatus::Pending,
            start_time: None,
            end_time: None,
            message: None,
            error_detail: None,
        }
    }
}

/// An admission request for a new job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub kind: JobKind,
    /// Start URL; required for web and browser jobs.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub depth: u32,
    #[serde(default)]
    pub force: bool,
    /// Caller-supplied id; generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub timeout_http_secs: Option<u64>,
    #[serde(default)]
    pub timeout_browser_secs: Option<u64>,
    #[serde(default)]
    pub max_body_size: Option<u64>,
    #[serde(default)]
    pub politeness_delay_ms: Option<u64>,
    /// When to upgrade an HTTP fetch to a browser render.
    #[serde(default)]
    pub fallback: Option<FallbackPolicy>,
    /// Repository URL; required for repo jobs.
    #[serde(default)]
    pub repo_url: Option<String>,
    /// Documentation subtree inside the repository.
    #[serde(default)]
    pub doc_subpath: Option<String>,
    /// Test-fixture override for the SSRF guard.
    #[serde(default)]
    pub allow_private_networks: bool,
}

impl JobRequest {
    #[must_use]
    pub fn web(url: impl Into<String>, depth: u32) -> Self {
        Self {
            kind: JobKind::Web,
            url: Some(url.into()),
            depth,
            force: false,
            id: None,
            timeout_http_secs: None,
            timeout_browser_secs: None,
            max_body_size: None,
            politeness_delay_ms: None,
            fallback: None,
            repo_url: None,
            doc_subpath: None,
            allow_private_networks: false,
        }
    }

    #[must_use]
    pub fn repo(repo_url: impl Into<String>) -> Self {
        Self {
            kind: JobKind::Repo,
            url: None,
            depth: 0,
            force: false,
            id: None,
            timeout_http_secs: None,
            timeout_browser_secs: None,
            max_body_size: None,
            politeness_delay_ms: None,
            fallback: None,
            repo_url: Some(repo_url.into()),
            doc_subpath: None,
            allow_private_networks: false,
        }
    }
}

/// Admission failures.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("invalid job request: {0}")]
    Invalid(String),
    #[error("a job with id '{0}' already exists")]
    Duplicate(String),
}

/// Reduce a caller-supplied id to the `[A-Za-z0-9_.\-]+` alphabet.
///
/// Disallowed characters become underscores; an id that sanitises to
/// nothing is rejected.
#[must_use]
pub fn sanitize_job_id(raw: &str) -> Option<String> {
    let sanitized: String = raw
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() || sanitized.chars().all(|c| c == '_') {
        None
    } else {
        Some(sanitized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitisation_maps_to_allowed_alphabet() {
        assert_eq!(sanitize_job_id("my-job.01"), Some("my-job.01".to_string()));
        assert_eq!(sanitize_job_id("a b/c"), Some("a_b_c".to_string()));
        assert_eq!(sanitize_job_id("  spaced  "), Some("spaced".to_string()));
        assert_eq!(sanitize_job_id(""), None);
        assert_eq!(sanitize_job_id("///"), None);
    }

    #[test]
    fn statuses_serialise_lowercase() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Running).unwrap(),
            "\"running\""
        );
        assert_eq!(serde_json::to_string(&JobKind::Repo).unwrap(), "\"repo\"");
    }
}
