//! Error types for search operations

use thiserror::Error;

/// Result type alias for search operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Error types for search operations
#[derive(Debug, Error)]
pub enum SearchError {
    /// The job has no index file; nothing was ever crawled under this id
    #[error("no index found for job '{0}'")]
    JobNotFound(String),

    /// The CSS selector could not be parsed (a client error)
    #[error("invalid CSS selector '{selector}': {message}")]
    InvalidSelector { selector: String, message: String },

    /// IO error while reading the index or a content file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for SearchError {
    fn from(error: anyhow::Error) -> Self {
        SearchError::Other(format!("{error:#}"))
    }
}

impl SearchError {
    /// Whether the caller, not the service, caused this error.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            SearchError::JobNotFound(_) | SearchError::InvalidSelector { .. }
        )
    }
}
