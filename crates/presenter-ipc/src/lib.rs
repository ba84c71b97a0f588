//! Typed shell<->engine messages for the presenter client.
//!
//! This crate defines the message types exchanged between the application
//! shell and the session engine, plus the configuration and identity types
//! shared by every other crate in the workspace.

mod commands;
mod events;
mod state;
mod types;

pub use commands::SessionCommand;
pub use events::{ErrorKind, SessionEvent};
pub use state::{SessionState, ShutdownPhase, StartupPhase};
pub use types::{CaptureSettings, Comment, MediaConstraints, SessionConfig, SessionIdentity};

use crossbeam_channel::{Receiver, Sender};

/// Channel capacity for commands (shell → engine).
pub const COMMAND_CHANNEL_CAPACITY: usize = 64;

/// Channel capacity for events (engine → shell).
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Creates a bounded command channel.
pub fn command_channel() -> (Sender<SessionCommand>, Receiver<SessionCommand>) {
    crossbeam_channel::bounded(COMMAND_CHANNEL_CAPACITY)
}

/// Creates a bounded event channel.
pub fn event_channel() -> (Sender<SessionEvent>, Receiver<SessionEvent>) {
    crossbeam_channel::bounded(EVENT_CHANNEL_CAPACITY)
}
