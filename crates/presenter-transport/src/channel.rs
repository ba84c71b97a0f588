//! The uniform event-channel interface.

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{json, Value};
use tokio::sync::mpsc::UnboundedSender;
use url::Url;

use crate::connection::ConnectionState;
use crate::packet::placeholder;
use crate::TransportResult;

/// Where inbound events are delivered.
pub type InboundSender = UnboundedSender<InboundEvent>;

/// Something the server (or the transport itself) told us.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// A connection was established.
    Connected,

    /// The connection was lost.
    Disconnected {
        /// Why the transport went away.
        reason: String,
    },

    /// A named server event.
    Event {
        /// Event name.
        name: String,

        /// First event argument (`Null` when absent).
        payload: Value,

        /// Binary attachments, in placeholder order.
        attachments: Vec<Bytes>,
    },
}

/// A named event to emit.
///
/// Binary attachments are referenced from `payload` by
/// `{"_placeholder": true, "num": N}` objects.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundEvent {
    /// Event name.
    pub name: String,

    /// Event argument, if any.
    pub payload: Option<Value>,

    /// Binary attachments.
    pub attachments: Vec<Bytes>,
}

impl OutboundEvent {
    /// An event with no argument.
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            payload: None,
            attachments: Vec::new(),
        }
    }

    /// An event with one JSON argument.
    pub fn json(name: impl Into<String>, payload: Value) -> Self {
        Self {
            name: name.into(),
            payload: Some(payload),
            attachments: Vec::new(),
        }
    }

    /// An event whose argument is `{field: <binary>}`.
    pub fn binary_field(name: impl Into<String>, field: &str, data: Bytes) -> Self {
        let mut payload = json!({});
        payload[field] = placeholder(0);
        Self {
            name: name.into(),
            payload: Some(payload),
            attachments: vec![data],
        }
    }

    /// Total attachment bytes.
    pub fn attachment_len(&self) -> usize {
        self.attachments.iter().map(Bytes::len).sum()
    }
}

/// Parameters for [`EventChannel::connect`].
#[derive(Debug, Clone)]
pub struct ConnectRequest {
    /// Service address; its path selects the namespace.
    pub address: Url,

    /// Extra query parameters sent with the handshake.
    pub query: Vec<(String, String)>,

    /// Receiver of inbound events, if the caller wants them.
    pub listener: Option<InboundSender>,
}

impl ConnectRequest {
    /// Create a request with no query and no listener.
    pub fn new(address: Url) -> Self {
        Self {
            address,
            query: Vec::new(),
            listener: None,
        }
    }

    /// Add a query parameter; `None` leaves it out.
    pub fn query_param(mut self, key: &str, value: Option<&str>) -> Self {
        if let Some(value) = value {
            self.query.push((key.to_string(), value.to_string()));
        }
        self
    }

    /// Deliver inbound events to `listener`.
    pub fn listener(mut self, listener: InboundSender) -> Self {
        self.listener = Some(listener);
        self
    }
}

/// A persistent, bidirectional, event-based connection.
#[async_trait]
pub trait EventChannel: Send + Sync {
    /// Open the channel. Moves Disconnected → Connecting → Connected and
    /// delivers [`InboundEvent::Connected`] to the listener on success.
    async fn connect(&self, request: ConnectRequest) -> TransportResult<()>;

    /// Queue an event. Returns false, without buffering anything, when the
    /// channel is not connected.
    fn send(&self, event: OutboundEvent) -> bool;

    /// Close the channel and detach the listener. Idempotent.
    async fn disconnect(&self);

    /// Current connectivity.
    fn state(&self) -> ConnectionState;

    /// Check if connected.
    fn is_connected(&self) -> bool {
        self.state().is_connected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_query_values_are_left_out() {
        let address = Url::parse("http://localhost/stream").unwrap();
        let request = ConnectRequest::new(address)
            .query_param("access_token", Some("abc"))
            .query_param("refresh_token", None);

        assert_eq!(
            request.query,
            vec![("access_token".to_string(), "abc".to_string())]
        );
    }

    #[test]
    fn test_binary_field_references_first_attachment() {
        let event = OutboundEvent::binary_field("video_data", "data", Bytes::from_static(b"xyz"));

        assert_eq!(
            event.payload,
            Some(json!({"data": {"_placeholder": true, "num": 0}}))
        );
        assert_eq!(event.attachment_len(), 3);
    }
}
