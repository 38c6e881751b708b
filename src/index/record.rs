//! Index record types
//!
//! One record per URL fetch attempt, in finalisation order. The JSONL file
//! these serialise into is the contract between the crawler and the search
//! side, so the field names and status strings are stable.

use serde::{Deserialize, Serialize};

/// Terminal classification of one fetch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    Success,
    Skipped,
    FailedRequest,
    FailedRobots,
    FailedPaywall,
    FailedSsrf,
    FailedToobig,
    FailedOther,
}

impl FetchStatus {
    /// Whether this status counts as a failure for job accounting.
    #[must_use]
    pub fn is_failure(self) -> bool {
        !matches!(self, Self::Success | Self::Skipped)
    }
}

/// Longest error message stored in a record, in bytes.
pub const MAX_ERROR_LEN: usize = 2000;

/// One line of a job's JSONL index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    pub original_url: String,
    pub canonical_url: String,
    /// Non-empty exactly when `fetch_status` is `success`.
    #[serde(default)]
    pub local_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    pub fetch_status: FetchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl IndexRecord {
    /// Build a record, truncating the error message to [`MAX_ERROR_LEN`].
    #[must_use]
    pub fn new(
        original_url: String,
        canonical_url: String,
        fetch_status: FetchStatus,
    ) -> Self {
        Self {
            original_url,
            canonical_url,
            local_path: String::new(),
            content_hash: None,
            fetch_status,
            http_status: None,
            error_message: None,
        }
    }

    #[must_use]
    pub fn with_local_path(mut self, path: String) -> Self {
        self.local_path = path;
        self
    }

    #[must_use]
    pub fn with_content_hash(mut self, hash: Option<String>) -> Self {
        self.content_hash = hash;
        self
    }

    #[must_use]
    pub fn with_http_status(mut self, status: Option<u16>) -> Self {
        self.http_status = status;
        self
    }

    #[must_use]
    pub fn with_error(mut self, message: Option<String>) -> Self {
        self.error_message = message.map(|m| truncate_on_char_boundary(m, MAX_ERROR_LEN));
        self
    }
}

fn truncate_on_char_boundary(mut s: String, max: usize) -> String {
    if s.len() <= max {
        return s;
    }
    let mut cut = max;
    while cut > 0 && !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
    s
}
