//! Core types for crawl runs: error and summary records

use std::fmt;

use crate::index::FetchStatus;

/// Custom error type for crawl operations
#[derive(Debug, Clone)]
pub enum CrawlError {
    /// Configuration or start-URL error
    ConfigError(String),
    /// Storage (content root or index) error
    StorageError(String),
    /// The job's cancellation token fired
    Cancelled,
    /// Other errors
    Other(String),
}

impl fmt::Display for CrawlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigError(msg) => write!(f, "Configuration error: {msg}"),
            Self::StorageError(msg) => write!(f, "Storage error: {msg}"),
            Self::Cancelled => write!(f, "Crawl was cancelled"),
            Self::Other(msg) => write!(f, "Crawl error: {msg}"),
        }
    }
}

impl std::error::Error for CrawlError {}

impl From<anyhow::Error> for CrawlError {
    fn from(err: anyhow::Error) -> Self {
        // {:#} preserves the full context chain
        Self::Other(format!("{err:#}"))
    }
}

/// Counters summarising a finished crawl.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrawlStats {
    pub attempted: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Terminal status of the start URL itself; drives the job's terminal
    /// state (a crawl whose start URL failed is a failed job).
    pub start_url_status: Option<FetchStatus>,
}

impl CrawlStats {
    #[must_use]
    pub fn start_url_failed(&self) -> bool {
        self.start_url_status.map(FetchStatus::is_failure).unwrap_or(true)
    }

    pub(crate) fn record(&mut self, status: FetchStatus) {
        self.attempted += 1;
        match status {
            FetchStatus::Success => self.succeeded += 1,
            FetchStatus::Skipped => self.skipped += 1,
            _ => self.failed += 1,
        }
    }
}
