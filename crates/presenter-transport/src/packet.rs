//! Engine.IO v4 / Socket.IO v5 packet codec.
//!
//! Text frames carry an Engine.IO type digit; `message` packets carry a
//! Socket.IO packet:
//!
//! ```text
//! <type>[<attachments>-][<namespace>,][<ack id>][<json data>]
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::TransportError;
use crate::TransportResult;

/// Placeholder object standing in for binary attachment `num`.
pub fn placeholder(num: usize) -> Value {
    json!({"_placeholder": true, "num": num})
}

/// Handshake data from the Engine.IO `open` packet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenInfo {
    /// Engine.IO session id.
    pub sid: String,

    /// Transports the server could upgrade to.
    #[serde(default)]
    pub upgrades: Vec<String>,

    /// Server ping period in milliseconds.
    pub ping_interval: u64,

    /// Grace period after a missed ping in milliseconds.
    pub ping_timeout: u64,

    /// Largest accepted payload.
    #[serde(default)]
    pub max_payload: Option<u64>,
}

impl OpenInfo {
    /// Silence after which the connection is considered dead.
    pub fn heartbeat_ms(&self) -> u64 {
        self.ping_interval + self.ping_timeout
    }
}

/// One Engine.IO text packet.
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    /// Session open (server → client).
    Open(OpenInfo),
    /// Transport close.
    Close,
    /// Heartbeat probe.
    Ping(String),
    /// Heartbeat answer.
    Pong(String),
    /// Socket.IO payload.
    Message(String),
    /// Transport upgrade.
    Upgrade,
    /// No-op.
    Noop,
}

impl EnginePacket {
    /// Decode a text frame.
    pub fn decode(text: &str) -> TransportResult<Self> {
        let mut chars = text.chars();
        let kind = chars
            .next()
            .ok_or_else(|| TransportError::Protocol("empty engine packet".to_string()))?;
        let body = chars.as_str();

        match kind {
            '0' => Ok(Self::Open(serde_json::from_str(body)?)),
            '1' => Ok(Self::Close),
            '2' => Ok(Self::Ping(body.to_string())),
            '3' => Ok(Self::Pong(body.to_string())),
            '4' => Ok(Self::Message(body.to_string())),
            '5' => Ok(Self::Upgrade),
            '6' => Ok(Self::Noop),
            other => Err(TransportError::Protocol(format!(
                "unknown engine packet type {other:?}"
            ))),
        }
    }

    /// Encode as a text frame.
    pub fn encode(&self) -> String {
        match self {
            Self::Open(info) => format!(
                "0{}",
                serde_json::to_string(info).unwrap_or_else(|_| "{}".to_string())
            ),
            Self::Close => "1".to_string(),
            Self::Ping(probe) => format!("2{probe}"),
            Self::Pong(probe) => format!("3{probe}"),
            Self::Message(body) => format!("4{body}"),
            Self::Upgrade => "5".to_string(),
            Self::Noop => "6".to_string(),
        }
    }
}

/// Socket.IO packet type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Connect,
    Disconnect,
    Event,
    Ack,
    ConnectError,
    BinaryEvent,
    BinaryAck,
}

impl PacketKind {
    fn from_char(c: char) -> Option<Self> {
        match c {
            '0' => Some(Self::Connect),
            '1' => Some(Self::Disconnect),
            '2' => Some(Self::Event),
            '3' => Some(Self::Ack),
            '4' => Some(Self::ConnectError),
            '5' => Some(Self::BinaryEvent),
            '6' => Some(Self::BinaryAck),
            _ => None,
        }
    }

    fn code(self) -> char {
        match self {
            Self::Connect => '0',
            Self::Disconnect => '1',
            Self::Event => '2',
            Self::Ack => '3',
            Self::ConnectError => '4',
            Self::BinaryEvent => '5',
            Self::BinaryAck => '6',
        }
    }

    /// Returns true for packet types followed by binary frames.
    pub fn is_binary(self) -> bool {
        matches!(self, Self::BinaryEvent | Self::BinaryAck)
    }
}

/// One Socket.IO packet.
#[derive(Debug, Clone, PartialEq)]
pub struct SocketPacket {
    /// Packet type.
    pub kind: PacketKind,

    /// Namespace, `/` for the main one.
    pub namespace: String,

    /// Number of binary frames that follow.
    pub attachments: usize,

    /// Acknowledgement id.
    pub id: Option<u64>,

    /// JSON data.
    pub data: Option<Value>,
}

impl SocketPacket {
    /// Namespace connect request.
    pub fn connect(namespace: &str) -> Self {
        Self::control(PacketKind::Connect, namespace)
    }

    /// Namespace disconnect.
    pub fn disconnect(namespace: &str) -> Self {
        Self::control(PacketKind::Disconnect, namespace)
    }

    fn control(kind: PacketKind, namespace: &str) -> Self {
        Self {
            kind,
            namespace: namespace.to_string(),
            attachments: 0,
            id: None,
            data: None,
        }
    }

    /// Event emission; `attachments > 0` makes it a binary event.
    pub fn event(namespace: &str, name: &str, payload: Option<Value>, attachments: usize) -> Self {
        let data = match payload {
            Some(payload) => json!([name, payload]),
            None => json!([name]),
        };

        Self {
            kind: if attachments > 0 {
                PacketKind::BinaryEvent
            } else {
                PacketKind::Event
            },
            namespace: namespace.to_string(),
            attachments,
            id: None,
            data: Some(data),
        }
    }

    /// Encode to the Socket.IO string form (without the Engine.IO prefix).
    pub fn encode(&self) -> String {
        let mut out = String::new();
        out.push(self.kind.code());

        if self.kind.is_binary() {
            out.push_str(&self.attachments.to_string());
            out.push('-');
        }

        if self.namespace != "/" {
            out.push_str(&self.namespace);
            out.push(',');
        }

        if let Some(id) = self.id {
            out.push_str(&id.to_string());
        }

        if let Some(ref data) = self.data {
            out.push_str(&data.to_string());
        }

        out
    }

    /// Decode from the Socket.IO string form.
    pub fn decode(text: &str) -> TransportResult<Self> {
        let mut chars = text.chars();
        let kind = chars
            .next()
            .and_then(PacketKind::from_char)
            .ok_or_else(|| TransportError::Protocol(format!("bad socket packet: {text:?}")))?;
        let mut rest = chars.as_str();

        let mut attachments = 0;
        if kind.is_binary() {
            let dash = rest
                .find('-')
                .ok_or_else(|| TransportError::Protocol("missing attachment count".to_string()))?;
            attachments = rest[..dash]
                .parse()
                .map_err(|_| TransportError::Protocol("bad attachment count".to_string()))?;
            rest = &rest[dash + 1..];
        }

        let namespace = if rest.starts_with('/') {
            let end = rest.find(',').unwrap_or(rest.len());
            let namespace = rest[..end].to_string();
            rest = rest.get(end + 1..).unwrap_or("");
            namespace
        } else {
            "/".to_string()
        };

        let digits = rest.chars().take_while(char::is_ascii_digit).count();
        let id = if digits > 0 {
            Some(
                rest[..digits]
                    .parse()
                    .map_err(|_| TransportError::Protocol("bad ack id".to_string()))?,
            )
        } else {
            None
        };
        rest = &rest[digits..];

        let data = if rest.is_empty() {
            None
        } else {
            Some(serde_json::from_str(rest)?)
        };

        Ok(Self {
            kind,
            namespace,
            attachments,
            id,
            data,
        })
    }

    /// Event name and first argument, for event packets.
    pub fn event_parts(&self) -> Option<(String, Value)> {
        if !matches!(self.kind, PacketKind::Event | PacketKind::BinaryEvent) {
            return None;
        }
        let args = self.data.as_ref()?.as_array()?;
        let name = args.first()?.as_str()?.to_string();
        let payload = args.get(1).cloned().unwrap_or(Value::Null);
        Some((name, payload))
    }

    /// Server-provided reason for a `CONNECT_ERROR`.
    pub fn error_message(&self) -> String {
        self.data
            .as_ref()
            .and_then(|data| data.get("message").and_then(Value::as_str).map(str::to_string))
            .or_else(|| self.data.as_ref().map(Value::to_string))
            .unwrap_or_else(|| "connection refused".to_string())
    }
}
