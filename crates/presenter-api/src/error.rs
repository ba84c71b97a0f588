//! Error types for API requests.

use thiserror::Error;

/// Errors from the one-shot HTTP requests.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The configured service URL is unusable.
    #[error("Invalid service URL: {0}")]
    InvalidUrl(String),

    /// The request never got a response.
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with an unexpected status.
    #[error("Unexpected status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// The service refused the request; `message` comes from the response body.
    #[error("{message}")]
    Rejected {
        /// HTTP status code.
        status: u16,

        /// Server-provided error text.
        message: String,
    },
}
