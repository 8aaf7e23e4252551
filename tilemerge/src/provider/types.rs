//! Transport error types.

use thiserror::Error;

/// Errors raised while fetching a tile body.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The request could not be sent or the body could not be read.
    #[error("HTTP error: {0}")]
    HttpError(String),

    /// The server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// A URL template that cannot address tiles.
    #[error("Invalid URL template '{template}': {reason}")]
    InvalidTemplate { template: String, reason: String },

    /// The request was aborted before it completed.
    #[error("Request cancelled")]
    Cancelled,
}
