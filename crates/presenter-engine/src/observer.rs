//! Event delivery to the shell.

use crossbeam_channel::Sender;
use tracing::warn;

use presenter_ipc::{ErrorKind, SessionEvent};

/// Non-blocking handle for pushing [`SessionEvent`]s to the shell.
#[derive(Clone)]
pub(crate) struct Observer {
    tx: Sender<SessionEvent>,
}

impl Observer {
    pub(crate) fn new(tx: Sender<SessionEvent>) -> Self {
        Self { tx }
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        if let Err(e) = self.tx.try_send(event) {
            warn!("Failed to send event: {}", e);
        }
    }

    /// Log a failure and report it.
    pub(crate) fn error(&self, kind: ErrorKind, recoverable: bool, message: impl Into<String>) {
        let message = message.into();
        warn!(kind = kind.name(), recoverable, %message, "Session error");
        self.emit(SessionEvent::Error {
            kind,
            recoverable,
            message,
        });
    }
}
