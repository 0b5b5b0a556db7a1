use thiserror::Error;

/// Result of one network call, as seen by the pipeline.
///
/// Transient failures are absorbed by the caller; fatal failures end the
/// search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome<T> {
    Success(T),
    TransientFailure(String),
    FatalFailure(String),
}

impl<T> FetchOutcome<T> {
    /// The payload on success, `None` otherwise
    pub fn ok(self) -> Option<T> {
        match self {
            FetchOutcome::Success(value) => Some(value),
            _ => None,
        }
    }
}

/// Errors that end a search without a result
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Search query is empty: {0}")]
    InvalidQuery(String),

    #[error("Search backend request failed on page {page}: {reason}")]
    Backend { page: u32, reason: String },

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}
