//! Commands sent from the shell to the engine.

use serde::{Deserialize, Serialize};

/// Commands that the shell can send to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionCommand {
    /// Go live: open both channels and acquire the capture device.
    Start,

    /// End the broadcast and tear everything down.
    Stop,

    /// Upload an audience-facing comment from the presenter.
    PostComment(String),

    /// Request the current session state.
    GetState,

    /// Request a snapshot of the comment log.
    GetComments,

    /// Stop any live session and shut the engine down.
    Shutdown,
}
