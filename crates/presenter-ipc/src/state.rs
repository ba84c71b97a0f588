//! Session state machine types.

use serde::{Deserialize, Serialize};

use crate::types::SessionIdentity;

/// The current state of the presenter session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum SessionState {
    /// No broadcast in progress.
    #[default]
    Idle,

    /// Channels and device are being brought up.
    Initializing {
        /// Current startup phase.
        phase: StartupPhase,
    },

    /// Live: chunks are flowing to the ingestion service.
    Streaming {
        /// Identity announced in `start_stream`.
        identity: SessionIdentity,
    },

    /// Teardown in progress.
    Stopping {
        /// Current shutdown phase.
        phase: ShutdownPhase,
    },

    /// Start failed; `start` may be retried.
    Error {
        /// Error message.
        message: String,

        /// Whether a retry is possible.
        recoverable: bool,
    },
}

impl SessionState {
    /// Returns true if the session is idle.
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Returns true if the session is live.
    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming { .. })
    }

    /// Returns true if the last start attempt failed.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Returns true if `start` would begin a new cycle from this state.
    pub fn accepts_start(&self) -> bool {
        match self {
            Self::Idle => true,
            Self::Error { recoverable, .. } => *recoverable,
            _ => false,
        }
    }

    /// Returns a simple string representation of the state.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Initializing { .. } => "Initializing",
            Self::Streaming { .. } => "Streaming",
            Self::Stopping { .. } => "Stopping",
            Self::Error { .. } => "Error",
        }
    }
}

/// Startup phases for a session, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StartupPhase {
    /// Opening the streaming channel with stored credentials.
    ConnectStreaming,

    /// Opening the comment channel.
    OpenComments,

    /// Acquiring the capture device.
    AcquireDevice,

    /// Emitting `start_stream`.
    AnnounceStream,
}

impl StartupPhase {
    /// Returns the next phase, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::ConnectStreaming => Some(Self::OpenComments),
            Self::OpenComments => Some(Self::AcquireDevice),
            Self::AcquireDevice => Some(Self::AnnounceStream),
            Self::AnnounceStream => None,
        }
    }

    /// Returns the previous phase, if any (for rollback).
    pub fn previous(self) -> Option<Self> {
        match self {
            Self::ConnectStreaming => None,
            Self::OpenComments => Some(Self::ConnectStreaming),
            Self::AcquireDevice => Some(Self::OpenComments),
            Self::AnnounceStream => Some(Self::AcquireDevice),
        }
    }

    /// Returns the display name for this phase.
    pub fn name(self) -> &'static str {
        match self {
            Self::ConnectStreaming => "Connecting to ingestion",
            Self::OpenComments => "Connecting to comments",
            Self::AcquireDevice => "Acquiring camera and microphone",
            Self::AnnounceStream => "Starting stream",
        }
    }
}

/// Teardown phases, in the order they must run.
///
/// The capture device is released before any network call, and `stop_stream`
/// is emitted before the channel carrying it is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShutdownPhase {
    /// Stopping the chunk timer and device tracks.
    ReleaseCapture,

    /// Emitting `stop_stream` if the streaming channel is still up.
    AnnounceStop,

    /// Closing the streaming channel.
    DisconnectStreaming,

    /// Closing the comment channel.
    CloseComments,

    /// Telling the composition service the session ended.
    NotifyTermination,
}

impl ShutdownPhase {
    /// The first phase of every teardown.
    pub const FIRST: Self = Self::ReleaseCapture;

    /// Returns the next phase, if any.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::ReleaseCapture => Some(Self::AnnounceStop),
            Self::AnnounceStop => Some(Self::DisconnectStreaming),
            Self::DisconnectStreaming => Some(Self::CloseComments),
            Self::CloseComments => Some(Self::NotifyTermination),
            Self::NotifyTermination => None,
        }
    }

    /// Returns the display name for this phase.
    pub fn name(self) -> &'static str {
        match self {
            Self::ReleaseCapture => "Releasing capture device",
            Self::AnnounceStop => "Stopping stream",
            Self::DisconnectStreaming => "Disconnecting from ingestion",
            Self::CloseComments => "Closing comments",
            Self::NotifyTermination => "Ending session",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_phases_run_in_fixed_order() {
        let mut phases = vec![ShutdownPhase::FIRST];
        while let Some(next) = phases.last().and_then(|p| p.next()) {
            phases.push(next);
        }

        assert_eq!(
            phases,
            vec![
                ShutdownPhase::ReleaseCapture,
                ShutdownPhase::AnnounceStop,
                ShutdownPhase::DisconnectStreaming,
                ShutdownPhase::CloseComments,
                ShutdownPhase::NotifyTermination,
            ]
        );
    }

    #[test]
    fn test_startup_rollback_walks_back_to_first_phase() {
        let mut phase = StartupPhase::AcquireDevice;
        let mut visited = vec![phase];
        while let Some(prev) = phase.previous() {
            visited.push(prev);
            phase = prev;
        }

        assert_eq!(
            visited,
            vec![
                StartupPhase::AcquireDevice,
                StartupPhase::OpenComments,
                StartupPhase::ConnectStreaming,
            ]
        );
    }

    #[test]
    fn test_start_is_accepted_from_idle_and_recoverable_error() {
        assert!(SessionState::Idle.accepts_start());
        assert!(SessionState::Error {
            message: "denied".into(),
            recoverable: true,
        }
        .accepts_start());
        assert!(!SessionState::Error {
            message: "broken".into(),
            recoverable: false,
        }
        .accepts_start());
        assert!(!SessionState::Stopping {
            phase: ShutdownPhase::CloseComments,
        }
        .accepts_start());
    }

    #[test]
    fn test_transient_phases_match_no_settled_state() {
        let initializing = SessionState::Initializing {
            phase: StartupPhase::OpenComments,
        };
        let stopping = SessionState::Stopping {
            phase: ShutdownPhase::CloseComments,
        };

        for state in [initializing, stopping] {
            assert!(!state.is_idle());
            assert!(!state.is_streaming());
            assert!(!state.is_error());
        }
    }
}
