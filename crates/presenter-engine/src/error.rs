//! Error types for the session engine.

use thiserror::Error;

use presenter_api::ApiError;

/// Errors returned by the session controller and engine.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A configured service address could not be parsed.
    #[error("Invalid service address {address}: {reason}")]
    InvalidAddress {
        /// The offending address.
        address: String,

        /// Parser message.
        reason: String,
    },

    /// The composition service did not acknowledge the end of the session.
    #[error("{0}")]
    Termination(#[from] ApiError),

    /// The engine runtime could not be built.
    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),
}
