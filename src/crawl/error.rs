//! Error types for crawl operations.

use thiserror::Error;

use crate::http::HttpError;
use crate::storage::StorageError;

/// Errors recorded for a single download or page-fetch attempt.
///
/// These never abort sibling operations in a batch; they end up in the
/// per-item reports.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// Transport-level failure (pool, client build, connect, timeout).
    #[error(transparent)]
    Http(#[from] HttpError),

    /// The server answered with an error status.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Persisting the fetched body failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl CrawlError {
    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }
}
