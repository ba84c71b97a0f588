//! Persistent event channels.
//!
//! Both the ingestion and the comment connections are [`EventChannel`]s:
//! connect, send, disconnect and a queryable [`ConnectionState`]. The
//! production implementation speaks Socket.IO over a WebSocket; the
//! in-memory one backs offline runs and tests.

mod channel;
mod connection;
mod error;
mod memory;
mod packet;
mod socketio;

pub use channel::{ConnectRequest, EventChannel, InboundEvent, InboundSender, OutboundEvent};
pub use connection::ConnectionState;
pub use error::TransportError;
pub use memory::{ChannelRecord, MemoryChannel};
pub use packet::{placeholder, EnginePacket, OpenInfo, PacketKind, SocketPacket};
pub use socketio::{websocket_url, SocketIoChannel};

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Engine.IO protocol revision spoken by [`SocketIoChannel`].
pub const ENGINE_IO_VERSION: &str = "4";

/// How long a graceful disconnect may take before the IO task is aborted.
pub const DISCONNECT_TIMEOUT_MS: u64 = 5000;
