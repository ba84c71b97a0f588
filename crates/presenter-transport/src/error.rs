//! Error types for the transport module.

use thiserror::Error;

/// Errors that can occur during transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The server refused the namespace connection.
    #[error("Connection rejected: {0}")]
    Rejected(String),

    /// Invalid channel address.
    #[error("Invalid channel URL: {0}")]
    InvalidUrl(String),

    /// Already connected or connecting.
    #[error("Already connected")]
    AlreadyConnected,

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Malformed Engine.IO / Socket.IO packet.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// JSON payload error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
