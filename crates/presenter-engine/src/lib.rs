//! Session orchestration for the presenter client.
//!
//! This crate ties the capture unit, the streaming and comment channels and
//! the one-shot HTTP requests together into a [`SessionController`], and
//! drives it from shell commands through the [`Engine`].

mod comments;
mod controller;
mod credentials;
mod error;
mod observer;
mod orchestrator;
mod statistics;
mod streaming;

pub use comments::{
    CommentChannel, CommentLog, NEW_COMMENT_EVENT, REGISTER_EVENT, REGISTRATION_EVENT,
};
pub use controller::{Collaborators, SessionController};
pub use credentials::{CredentialStore, Credentials, FileCredentialStore, StaticCredentials};
pub use error::SessionError;
pub use orchestrator::Engine;
pub use statistics::StreamingStatistics;
pub use streaming::{StreamingChannel, START_STREAM_EVENT, STOP_STREAM_EVENT, VIDEO_DATA_EVENT};

use crossbeam_channel::{Receiver, Sender};

use presenter_ipc::{SessionCommand, SessionConfig, SessionEvent, SessionIdentity};

/// Create an engine instance with IPC channels.
pub fn create_engine(
    command_rx: Receiver<SessionCommand>,
    event_tx: Sender<SessionEvent>,
    config: SessionConfig,
    identity: SessionIdentity,
    collaborators: Collaborators,
) -> Result<Engine, SessionError> {
    Engine::new(command_rx, event_tx, config, identity, collaborators)
}
