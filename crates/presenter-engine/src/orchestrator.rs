//! Command loop driving a session controller.

use crossbeam_channel::{Receiver, Sender};
use tokio::runtime::{Builder, Runtime};
use tracing::{debug, info, instrument, warn};

use presenter_ipc::{SessionCommand, SessionConfig, SessionEvent, SessionIdentity};

use crate::controller::{Collaborators, SessionController};
use crate::error::SessionError;

/// Runs a [`SessionController`] behind a command channel.
///
/// The engine owns the tokio runtime the controller's tasks live on; the
/// command loop itself is blocking and belongs on a dedicated thread.
pub struct Engine {
    command_rx: Receiver<SessionCommand>,
    event_tx: Sender<SessionEvent>,
    controller: SessionController,
    runtime: Runtime,
}

impl Engine {
    /// Create a new engine.
    pub fn new(
        command_rx: Receiver<SessionCommand>,
        event_tx: Sender<SessionEvent>,
        config: SessionConfig,
        identity: SessionIdentity,
        collaborators: Collaborators,
    ) -> Result<Self, SessionError> {
        let runtime = Builder::new_multi_thread()
            .enable_all()
            .thread_name("presenter-engine")
            .build()?;

        let controller =
            SessionController::new(config, identity, collaborators, event_tx.clone())?;

        Ok(Self {
            command_rx,
            event_tx,
            controller,
            runtime,
        })
    }

    /// Run the engine (blocking).
    #[instrument(name = "engine_run", skip(self))]
    pub fn run(&mut self) {
        info!("Engine starting");
        self.send_event(SessionEvent::Ready);

        loop {
            match self.command_rx.recv() {
                Ok(command) => {
                    if !self.handle_command(command) {
                        break;
                    }
                }
                Err(_) => {
                    info!("Command channel disconnected, shutting down");
                    self.stop_session();
                    break;
                }
            }
        }

        info!("Engine stopped");
    }

    /// Handle a command. Returns false if engine should stop.
    fn handle_command(&mut self, command: SessionCommand) -> bool {
        debug!(?command, "Handling command");

        match command {
            SessionCommand::Start => self.runtime.block_on(self.controller.start()),
            SessionCommand::Stop => self.stop_session(),
            SessionCommand::PostComment(message) => {
                let _guard = self.runtime.enter();
                self.controller.post_comment(message);
            }
            SessionCommand::GetState => self.send_state(),
            SessionCommand::GetComments => {
                self.send_event(SessionEvent::Comments(self.controller.comments()));
            }
            SessionCommand::Shutdown => {
                self.stop_session();
                self.send_event(SessionEvent::Shutdown);
                return false;
            }
        }

        true
    }

    fn stop_session(&mut self) {
        // Failures were already reported to the shell by the controller.
        if let Err(e) = self.runtime.block_on(self.controller.stop()) {
            warn!("Session ended with error: {}", e);
        }
    }

    fn send_state(&self) {
        let state = self.controller.state().clone();
        self.send_event(SessionEvent::StateChanged {
            previous: Box::new(state.clone()),
            current: Box::new(state),
        });
    }

    fn send_event(&self, event: SessionEvent) {
        if let Err(e) = self.event_tx.try_send(event) {
            warn!("Failed to send event: {}", e);
        }
    }
}
