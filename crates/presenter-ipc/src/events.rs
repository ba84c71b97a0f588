//! Events sent from the engine to the shell.

use serde::{Deserialize, Serialize};

use crate::state::SessionState;
use crate::types::Comment;

/// Failure categories surfaced to the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Capture device permission denied or unavailable.
    DeviceAccess,

    /// An event channel could not be established.
    ChannelConnection,

    /// A one-shot HTTP request failed.
    Request,
}

impl ErrorKind {
    /// Returns a short display name for this category.
    pub fn name(self) -> &'static str {
        match self {
            Self::DeviceAccess => "device",
            Self::ChannelConnection => "channel",
            Self::Request => "request",
        }
    }
}

/// Events that the engine can send to the shell.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionEvent {
    /// Session state has changed.
    StateChanged {
        /// Previous state.
        previous: Box<SessionState>,

        /// Current state.
        current: Box<SessionState>,
    },

    /// A new audience comment was appended to the log.
    CommentReceived(Comment),

    /// Snapshot of the full comment log, in arrival order.
    Comments(Vec<Comment>),

    /// Error occurred.
    Error {
        /// Failure category.
        kind: ErrorKind,

        /// Whether the session is still usable.
        recoverable: bool,

        /// Error message.
        message: String,
    },

    /// Engine is ready.
    Ready,

    /// Engine has shut down.
    Shutdown,
}
