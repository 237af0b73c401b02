//! Error types for live channel lists.

use thiserror::Error;

/// Result type for fetcher operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Result type for live query operations.
pub type LiveQueryResult<T> = Result<T, LiveQueryError>;

/// Failure of a remote page fetch. Recoverable: the caller decides whether
/// and when to retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Network error.
    #[error("network error: {0}")]
    Network(String),

    /// The backend rejected the request.
    #[error("backend error {status}: {message}")]
    Backend { status: u16, message: String },

    /// Timeout.
    #[error("fetch timed out")]
    Timeout,

    /// The fetch was superseded or the view was torn down.
    #[error("fetch cancelled")]
    Cancelled,
}

/// Errors surfaced by a live channel list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LiveQueryError {
    /// A bootstrap, page or refresh fetch failed. The view is unchanged.
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// The view has not completed its bootstrap yet.
    #[error("live query is not ready")]
    NotReady,

    /// The view was torn down.
    #[error("live query was torn down")]
    TornDown,

    /// The ordered view broke uniqueness or ordering.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}
