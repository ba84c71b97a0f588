//! Session controller: the start/stop state machine.

use std::sync::Arc;

use crossbeam_channel::Sender;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use presenter_api::{CommentPoster, TerminationNotifier, TerminationRequest};
use presenter_capture::{CaptureDevice, CaptureError, CaptureUnit, LossHandler};
use presenter_ipc::{
    Comment, ErrorKind, SessionConfig, SessionEvent, SessionIdentity, SessionState,
    ShutdownPhase, StartupPhase,
};
use presenter_transport::EventChannel;

use crate::comments::CommentChannel;
use crate::credentials::CredentialStore;
use crate::error::SessionError;
use crate::observer::Observer;
use crate::statistics::StreamingStatistics;
use crate::streaming::StreamingChannel;

/// External collaborators the controller drives.
pub struct Collaborators {
    /// Channel to the ingestion service.
    pub streaming_channel: Arc<dyn EventChannel>,

    /// Channel to the comment service.
    pub comment_channel: Arc<dyn EventChannel>,

    /// Camera/microphone source.
    pub device: Arc<dyn CaptureDevice>,

    /// Stored login tokens.
    pub credentials: Arc<dyn CredentialStore>,

    /// Outbound comment upload.
    pub poster: Arc<dyn CommentPoster>,

    /// End-of-session notice.
    pub notifier: Arc<dyn TerminationNotifier>,
}

/// Owns one presenter session: the capture unit and both channels.
///
/// Lifecycle methods take `&mut self`, so a start and a stop can never
/// interleave.
pub struct SessionController {
    identity: SessionIdentity,
    streaming_address: Url,
    comment_address: Url,
    streaming: StreamingChannel,
    comments: CommentChannel,
    capture: CaptureUnit,
    credentials: Arc<dyn CredentialStore>,
    poster: Arc<dyn CommentPoster>,
    notifier: Arc<dyn TerminationNotifier>,
    state: SessionState,
    observer: Observer,
}

impl SessionController {
    /// Create an idle controller.
    pub fn new(
        config: SessionConfig,
        identity: SessionIdentity,
        collaborators: Collaborators,
        event_tx: Sender<SessionEvent>,
    ) -> Result<Self, SessionError> {
        let observer = Observer::new(event_tx);
        let loss_observer = observer.clone();
        let on_lost: LossHandler = Arc::new(move |e: CaptureError| {
            loss_observer.error(ErrorKind::DeviceAccess, true, e.to_string());
        });

        Ok(Self {
            identity,
            streaming_address: parse_address(&config.streaming_service)?,
            comment_address: parse_address(&config.comment_service)?,
            streaming: StreamingChannel::new(collaborators.streaming_channel),
            comments: CommentChannel::new(collaborators.comment_channel, observer.clone()),
            capture: CaptureUnit::new(collaborators.device, config.capture)
                .on_device_lost(on_lost),
            credentials: collaborators.credentials,
            poster: collaborators.poster,
            notifier: collaborators.notifier,
            state: SessionState::Idle,
            observer,
        })
    }

    /// Go live.
    ///
    /// Accepted from `Idle` and from a recoverable `Error`; a no-op
    /// otherwise. Channel failures are reported and the session carries on
    /// with chunks being dropped. A device failure disconnects the streaming
    /// channel and leaves the session in a retryable `Error`; comments keep
    /// flowing.
    #[instrument(
        name = "session_start",
        skip(self),
        fields(session_id = %self.identity.session_id)
    )]
    pub async fn start(&mut self) {
        if !self.state.accepts_start() {
            debug!(state = self.state.name(), "Start ignored");
            return;
        }

        info!("Starting session");
        let mut phase = StartupPhase::ConnectStreaming;

        loop {
            self.transition_to(SessionState::Initializing { phase });

            if let Err(message) = self.init_phase(phase).await {
                error!(phase = phase.name(), "Session start failed: {}", message);
                self.rollback(phase).await;
                self.transition_to(SessionState::Error {
                    message: message.clone(),
                    recoverable: true,
                });
                self.observer.error(ErrorKind::DeviceAccess, true, message);
                return;
            }

            match phase.next() {
                Some(next) => phase = next,
                None => break,
            }
        }

        self.transition_to(SessionState::Streaming {
            identity: self.identity.clone(),
        });
        info!("Session live");
    }

    /// Run one startup phase. Only device failures abort the start.
    async fn init_phase(&mut self, phase: StartupPhase) -> Result<(), String> {
        match phase {
            StartupPhase::ConnectStreaming => {
                let credentials = self.credentials.credentials();
                if let Err(e) = self
                    .streaming
                    .connect(&self.streaming_address, &credentials)
                    .await
                {
                    self.observer.error(
                        ErrorKind::ChannelConnection,
                        true,
                        format!("Streaming channel: {}", e),
                    );
                }
            }
            StartupPhase::OpenComments => {
                if let Err(e) = self
                    .comments
                    .open(&self.comment_address, &self.identity.session_id)
                    .await
                {
                    self.observer.error(
                        ErrorKind::ChannelConnection,
                        true,
                        format!("Comment channel: {}", e),
                    );
                }
            }
            StartupPhase::AcquireDevice => {
                let sink = self.streaming.chunk_sink();
                self.capture
                    .acquire(sink)
                    .await
                    .map_err(|e| e.to_string())?;
            }
            StartupPhase::AnnounceStream => {
                if !self.streaming.send_start(&self.identity) {
                    warn!("Streaming channel down, start_stream not sent");
                }
            }
        }

        Ok(())
    }

    /// Undo every phase before `failed`, newest first. The comment channel
    /// is left open; only `stop` closes it.
    async fn rollback(&mut self, failed: StartupPhase) {
        let mut phase = failed.previous();

        while let Some(current) = phase {
            debug!(phase = current.name(), "Rolling back");
            match current {
                StartupPhase::ConnectStreaming => self.streaming.disconnect().await,
                StartupPhase::OpenComments => debug!("Comment channel stays open"),
                StartupPhase::AcquireDevice => self.capture.release().await,
                StartupPhase::AnnounceStream => {}
            }
            phase = current.previous();
        }
    }

    /// End the broadcast.
    ///
    /// Teardown always runs in the same order: capture, `stop_stream`,
    /// streaming channel, comment channel, termination notice. Safe to call
    /// any number of times; from `Idle` nothing is announced and the state
    /// does not change. A failed termination notice is reported and returned,
    /// but the session still ends in `Idle`.
    #[instrument(
        name = "session_stop",
        skip(self),
        fields(session_id = %self.identity.session_id)
    )]
    pub async fn stop(&mut self) -> Result<(), SessionError> {
        if self.state.is_idle() {
            self.capture.release().await;
            self.streaming.disconnect().await;
            self.comments.close().await;
            debug!("Already idle, nothing to stop");
            return Ok(());
        }

        info!("Stopping session");
        let mut phase = Some(ShutdownPhase::FIRST);
        let mut outcome = Ok(());

        while let Some(current) = phase {
            self.transition_to(SessionState::Stopping { phase: current });
            if let Err(e) = self.shutdown_phase(current).await {
                outcome = Err(e);
            }
            phase = current.next();
        }

        let statistics = self.streaming.statistics();
        info!(
            sent = statistics.sent_chunks,
            dropped = statistics.dropped_chunks,
            bytes = statistics.bytes_sent,
            "Session stopped"
        );

        self.transition_to(SessionState::Idle);

        if let Err(ref e) = outcome {
            self.observer.error(ErrorKind::Request, true, e.to_string());
        }
        outcome
    }

    async fn shutdown_phase(&mut self, phase: ShutdownPhase) -> Result<(), SessionError> {
        match phase {
            ShutdownPhase::ReleaseCapture => self.capture.release().await,
            ShutdownPhase::AnnounceStop => {
                if self.streaming.is_connected() {
                    self.streaming.send_stop();
                }
            }
            ShutdownPhase::DisconnectStreaming => self.streaming.disconnect().await,
            ShutdownPhase::CloseComments => self.comments.close().await,
            ShutdownPhase::NotifyTermination => {
                let request = TerminationRequest {
                    streamer_id: self.identity.presenter_id.clone(),
                    session_id: self.identity.session_id.clone(),
                };
                self.notifier.notify_end(&request).await?;
            }
        }

        Ok(())
    }

    /// Upload a comment on a detached task. Failures are reported to the
    /// observer only. Must be called from within a tokio runtime.
    pub fn post_comment(&self, message: String) -> JoinHandle<()> {
        let poster = Arc::clone(&self.poster);
        let observer = self.observer.clone();

        tokio::spawn(async move {
            match poster.post_comment(&message).await {
                Ok(()) => debug!("Comment posted"),
                Err(e) => observer.error(
                    ErrorKind::Request,
                    true,
                    format!("Failed to send comment: {}", e),
                ),
            }
        })
    }

    /// Comments received so far, oldest first.
    pub fn comments(&self) -> Vec<Comment> {
        self.comments.log().snapshot()
    }

    /// Current session state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Streaming counters for the current (or last) session.
    pub fn statistics(&self) -> StreamingStatistics {
        self.streaming.statistics()
    }

    /// Tracks held by the capture unit right now.
    pub fn live_tracks(&self) -> usize {
        self.capture.live_tracks()
    }

    /// Session identity.
    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    fn transition_to(&mut self, new_state: SessionState) {
        let previous = std::mem::replace(&mut self.state, new_state.clone());

        debug!(
            previous = %previous.name(),
            current = %new_state.name(),
            "State transition"
        );

        self.observer.emit(SessionEvent::StateChanged {
            previous: Box::new(previous),
            current: Box::new(new_state),
        });
    }
}

fn parse_address(address: &str) -> Result<Url, SessionError> {
    Url::parse(address).map_err(|e| SessionError::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })
}
