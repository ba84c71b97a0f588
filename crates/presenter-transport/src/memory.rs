//! In-memory event channel for offline runs and tests.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::channel::{ConnectRequest, EventChannel, InboundEvent, InboundSender, OutboundEvent};
use crate::connection::ConnectionState;
use crate::error::TransportError;
use crate::TransportResult;

/// One entry in a [`MemoryChannel`]'s journal.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelRecord {
    /// `connect` succeeded with these query parameters.
    Connected { query: Vec<(String, String)> },

    /// An event was accepted by `send`.
    Sent(OutboundEvent),

    /// `disconnect` was called while a connection was open.
    Disconnected,
}

#[derive(Default)]
struct Inner {
    state: ConnectionState,
    journal: Vec<ChannelRecord>,
    listener: Option<InboundSender>,
    refuse_with: Option<String>,
}

/// An [`EventChannel`] that keeps everything in memory.
///
/// Clones share the same state, so a test can keep one handle and hand the
/// other to the code under test. [`MemoryChannel::inject`] plays the server.
#[derive(Clone, Default)]
pub struct MemoryChannel {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryChannel {
    /// A channel that accepts connections.
    pub fn new() -> Self {
        Self::default()
    }

    /// A channel whose `connect` always fails with `reason`.
    pub fn refusing(reason: impl Into<String>) -> Self {
        let channel = Self::new();
        channel.inner.lock().refuse_with = Some(reason.into());
        channel
    }

    /// Everything that happened, in order.
    pub fn journal(&self) -> Vec<ChannelRecord> {
        self.inner.lock().journal.clone()
    }

    /// Events accepted by `send`, in order.
    pub fn sent(&self) -> Vec<OutboundEvent> {
        self.inner
            .lock()
            .journal
            .iter()
            .filter_map(|record| match record {
                ChannelRecord::Sent(event) => Some(event.clone()),
                _ => None,
            })
            .collect()
    }

    /// Events named `name` accepted by `send`, in order.
    pub fn sent_named(&self, name: &str) -> Vec<OutboundEvent> {
        self.sent().into_iter().filter(|e| e.name == name).collect()
    }

    /// Number of successful `connect` calls.
    pub fn connections(&self) -> usize {
        self.inner
            .lock()
            .journal
            .iter()
            .filter(|record| matches!(record, ChannelRecord::Connected { .. }))
            .count()
    }

    /// Returns true while a listener is attached.
    pub fn has_listener(&self) -> bool {
        self.inner.lock().listener.is_some()
    }

    /// Deliver a server-side event. `Connected` and `Disconnected` also move
    /// the connection state, as a real transport would.
    pub fn inject(&self, event: InboundEvent) {
        let listener = {
            let mut inner = self.inner.lock();
            match event {
                InboundEvent::Connected => inner.state = ConnectionState::Connected,
                InboundEvent::Disconnected { .. } => inner.state = ConnectionState::Disconnected,
                InboundEvent::Event { .. } => {}
            }
            inner.listener.clone()
        };

        if let Some(listener) = listener {
            let _ = listener.send(event);
        }
    }
}

#[async_trait]
impl EventChannel for MemoryChannel {
    async fn connect(&self, request: ConnectRequest) -> TransportResult<()> {
        let listener = {
            let mut inner = self.inner.lock();
            if inner.state != ConnectionState::Disconnected {
                return Err(TransportError::AlreadyConnected);
            }
            if let Some(ref reason) = inner.refuse_with {
                return Err(TransportError::ConnectionFailed(reason.clone()));
            }

            inner.state = ConnectionState::Connected;
            inner.journal.push(ChannelRecord::Connected {
                query: request.query,
            });
            inner.listener = request.listener;
            inner.listener.clone()
        };

        debug!(address = %request.address, "Memory channel connected");
        if let Some(listener) = listener {
            let _ = listener.send(InboundEvent::Connected);
        }
        Ok(())
    }

    fn send(&self, event: OutboundEvent) -> bool {
        let mut inner = self.inner.lock();
        if !inner.state.is_connected() {
            trace!(event = %event.name, "Not connected, event dropped");
            return false;
        }
        inner.journal.push(ChannelRecord::Sent(event));
        true
    }

    async fn disconnect(&self) {
        let mut inner = self.inner.lock();
        inner.listener = None;
        if inner.state != ConnectionState::Disconnected {
            inner.state = ConnectionState::Disconnected;
            inner.journal.push(ChannelRecord::Disconnected);
        }
    }

    fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }
}
