//! Comment channel: live audience comments and the presenter registration
//! handshake.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{json, Value};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use presenter_ipc::{Comment, SessionEvent};
use presenter_transport::{
    ConnectRequest, ConnectionState, EventChannel, InboundEvent, OutboundEvent, TransportResult,
};

use crate::observer::Observer;

/// Registers the presenter on every connection.
pub const REGISTER_EVENT: &str = "register_streamer";

/// A new audience comment.
pub const NEW_COMMENT_EVENT: &str = "new_comment";

/// Server verdict on a registration.
pub const REGISTRATION_EVENT: &str = "registration";

/// Append-only, arrival-ordered comment history.
#[derive(Debug, Clone, Default)]
pub struct CommentLog {
    entries: Arc<RwLock<Vec<Comment>>>,
}

impl CommentLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a comment.
    pub fn append(&self, comment: Comment) {
        self.entries.write().push(comment);
    }

    /// Copy of every comment so far, oldest first.
    pub fn snapshot(&self) -> Vec<Comment> {
        self.entries.read().clone()
    }

    /// Number of comments received.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing has arrived yet.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

struct InboundTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Typed wrapper over the comment [`EventChannel`].
pub struct CommentChannel {
    channel: Arc<dyn EventChannel>,
    log: CommentLog,
    observer: Observer,
    inbound: Option<InboundTask>,
}

impl CommentChannel {
    pub(crate) fn new(channel: Arc<dyn EventChannel>, observer: Observer) -> Self {
        Self {
            channel,
            log: CommentLog::new(),
            observer,
            inbound: None,
        }
    }

    /// Connect and start handling inbound events. Every `connect` event
    /// triggers exactly one `register_streamer` for `streamer_id`.
    ///
    /// Does nothing while a previous `open` is still connected.
    #[instrument(
        name = "comments_open",
        skip_all,
        fields(address = %address, streamer_id = %streamer_id)
    )]
    pub async fn open(&mut self, address: &Url, streamer_id: &str) -> TransportResult<()> {
        if self.inbound.is_some() {
            if self.channel.state() != ConnectionState::Disconnected {
                debug!("Comment channel already open");
                return Ok(());
            }
            self.close().await;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_inbound(
            rx,
            Arc::clone(&self.channel),
            streamer_id.to_string(),
            self.log.clone(),
            self.observer.clone(),
            cancel.clone(),
        ));
        self.inbound = Some(InboundTask { cancel, handle });

        let request = ConnectRequest::new(address.clone()).listener(tx);
        if let Err(e) = self.channel.connect(request).await {
            self.stop_inbound().await;
            return Err(e);
        }

        info!("Comment channel open");
        Ok(())
    }

    /// Stop the inbound task and disconnect. Idempotent.
    #[instrument(name = "comments_close", skip(self))]
    pub async fn close(&mut self) {
        self.stop_inbound().await;
        self.channel.disconnect().await;
    }

    async fn stop_inbound(&mut self) {
        if let Some(task) = self.inbound.take() {
            task.cancel.cancel();
            if let Err(e) = task.handle.await {
                warn!("Comment task ended abnormally: {}", e);
            }
        }
    }

    /// The shared comment history.
    pub fn log(&self) -> &CommentLog {
        &self.log
    }

    /// Current connectivity.
    pub fn state(&self) -> ConnectionState {
        self.channel.state()
    }
}

impl Drop for CommentChannel {
    fn drop(&mut self) {
        if let Some(task) = self.inbound.take() {
            task.cancel.cancel();
        }
    }
}

async fn run_inbound(
    mut rx: UnboundedReceiver<InboundEvent>,
    channel: Arc<dyn EventChannel>,
    streamer_id: String,
    log: CommentLog,
    observer: Observer,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        match event {
            InboundEvent::Connected => {
                let sent = channel.send(OutboundEvent::json(
                    REGISTER_EVENT,
                    json!({ "streamer_id": streamer_id }),
                ));
                debug!(sent, "Registration sent");
            }
            InboundEvent::Disconnected { reason } => {
                info!(%reason, "Comment channel disconnected");
            }
            InboundEvent::Event { name, payload, .. } => match name.as_str() {
                NEW_COMMENT_EVENT => {
                    let comment = Comment::new(payload);
                    log.append(comment.clone());
                    observer.emit(SessionEvent::CommentReceived(comment));
                }
                REGISTRATION_EVENT => {
                    let status = payload.get("status").cloned().unwrap_or(Value::Null);
                    info!(%status, "Registration acknowledged");
                }
                other => debug!(event = other, "Unhandled comment event"),
            },
        }
    }

    debug!("Comment task stopped");
}
