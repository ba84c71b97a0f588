//! Socket.IO client channel over the WebSocket transport.
//!
//! Only the WebSocket transport is used; there is no long-polling fallback
//! and no reconnection.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, timeout, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};
use url::Url;

use crate::channel::{ConnectRequest, EventChannel, InboundEvent, InboundSender, OutboundEvent};
use crate::connection::ConnectionState;
use crate::error::TransportError;
use crate::packet::{EnginePacket, OpenInfo, PacketKind, SocketPacket};
use crate::{TransportResult, DISCONNECT_TIMEOUT_MS, ENGINE_IO_VERSION};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Build the WebSocket handshake URL for a Socket.IO service address.
///
/// Returns the URL and the namespace selected by the address path.
pub fn websocket_url(address: &Url, query: &[(String, String)]) -> TransportResult<(Url, String)> {
    let scheme = match address.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(TransportError::InvalidUrl(format!(
                "unsupported scheme {other:?}"
            )))
        }
    };

    if address.host_str().is_none() {
        return Err(TransportError::InvalidUrl("missing host".to_string()));
    }

    let namespace = match address.path().trim_end_matches('/') {
        "" => "/".to_string(),
        path => path.to_string(),
    };

    let existing: Vec<(String, String)> = address
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let mut url = address.clone();
    url.set_scheme(scheme)
        .map_err(|_| TransportError::InvalidUrl(format!("cannot use scheme {scheme}")))?;
    url.set_path("/socket.io/");
    url.set_query(None);
    url.set_fragment(None);
    {
        let mut pairs = url.query_pairs_mut();
        pairs.append_pair("EIO", ENGINE_IO_VERSION);
        pairs.append_pair("transport", "websocket");
        for (key, value) in existing.iter().chain(query) {
            pairs.append_pair(key, value);
        }
    }

    Ok((url, namespace))
}

/// Live connection resources.
struct Link {
    namespace: String,
    outbound: mpsc::UnboundedSender<Vec<Message>>,
    cancel: CancellationToken,
    io_task: JoinHandle<()>,
}

struct Shared {
    label: String,
    state: RwLock<ConnectionState>,
    link: Mutex<Option<Link>>,
    listener: Mutex<Option<InboundSender>>,
}

impl Shared {
    fn notify(&self, event: InboundEvent) {
        if let Some(ref listener) = *self.listener.lock() {
            if listener.send(event).is_err() {
                trace!(channel = %self.label, "Listener gone, event dropped");
            }
        }
    }

    fn mark_lost(&self, reason: String) {
        let was_connected = {
            let mut state = self.state.write();
            let was = state.is_connected();
            *state = ConnectionState::Disconnected;
            was
        };

        if was_connected {
            warn!(channel = %self.label, %reason, "Channel lost");
            self.notify(InboundEvent::Disconnected { reason });
        }
    }
}

/// An [`EventChannel`] speaking Socket.IO v5 over a WebSocket.
pub struct SocketIoChannel {
    shared: Arc<Shared>,
}

impl SocketIoChannel {
    /// Create a disconnected channel. `label` tags its log lines.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(Shared {
                label: label.into(),
                state: RwLock::new(ConnectionState::Disconnected),
                link: Mutex::new(None),
                listener: Mutex::new(None),
            }),
        }
    }
}

/// Socket after the Engine.IO open and namespace connect.
struct Handshaken {
    sink: WsSink,
    source: WsSource,
    open: OpenInfo,
    namespace: String,
}

#[async_trait]
impl EventChannel for SocketIoChannel {
    #[instrument(
        name = "channel_connect",
        skip_all,
        fields(channel = %self.shared.label, address = %request.address)
    )]
    async fn connect(&self, request: ConnectRequest) -> TransportResult<()> {
        {
            let mut state = self.shared.state.write();
            if *state != ConnectionState::Disconnected {
                return Err(TransportError::AlreadyConnected);
            }
            *state = ConnectionState::Connecting;
        }

        let handshaken = match handshake(&request).await {
            Ok(handshaken) => handshaken,
            Err(e) => {
                *self.shared.state.write() = ConnectionState::Disconnected;
                return Err(e);
            }
        };

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let namespace = handshaken.namespace.clone();

        {
            let mut link = self.shared.link.lock();
            let mut state = self.shared.state.write();
            if *state != ConnectionState::Connecting {
                return Err(TransportError::ConnectionFailed(
                    "closed while connecting".to_string(),
                ));
            }

            *self.shared.listener.lock() = request.listener;
            let io_task = tokio::spawn(run_io(
                handshaken,
                outbound_rx,
                cancel.clone(),
                Arc::clone(&self.shared),
            ));

            *link = Some(Link {
                namespace,
                outbound: outbound_tx,
                cancel,
                io_task,
            });
            *state = ConnectionState::Connected;
        }

        info!("Channel connected");
        self.shared.notify(InboundEvent::Connected);
        Ok(())
    }

    fn send(&self, event: OutboundEvent) -> bool {
        let link = self.shared.link.lock();
        let Some(ref link) = *link else {
            trace!(
                channel = %self.shared.label,
                event = %event.name,
                "Not connected, event dropped"
            );
            return false;
        };
        if !self.shared.state.read().is_connected() {
            trace!(
                channel = %self.shared.label,
                event = %event.name,
                "Not connected, event dropped"
            );
            return false;
        }

        let packet = SocketPacket::event(
            &link.namespace,
            &event.name,
            event.payload,
            event.attachments.len(),
        );
        let mut frames = Vec::with_capacity(1 + event.attachments.len());
        frames.push(Message::text(EnginePacket::Message(packet.encode()).encode()));
        frames.extend(event.attachments.into_iter().map(Message::binary));

        link.outbound.send(frames).is_ok()
    }

    #[instrument(name = "channel_disconnect", skip(self), fields(channel = %self.shared.label))]
    async fn disconnect(&self) {
        let link = {
            let mut link = self.shared.link.lock();
            *self.shared.state.write() = ConnectionState::Disconnected;
            link.take()
        };
        self.shared.listener.lock().take();

        let Some(link) = link else {
            return;
        };

        let goodbye = EnginePacket::Message(SocketPacket::disconnect(&link.namespace).encode());
        let _ = link.outbound.send(vec![Message::text(goodbye.encode())]);
        drop(link.outbound);

        let mut io_task = link.io_task;
        if timeout(Duration::from_millis(DISCONNECT_TIMEOUT_MS), &mut io_task)
            .await
            .is_err()
        {
            warn!("Channel did not close in time, aborting");
            link.cancel.cancel();
            io_task.abort();
        }

        info!("Channel disconnected");
    }

    fn state(&self) -> ConnectionState {
        *self.shared.state.read()
    }
}

impl Drop for SocketIoChannel {
    fn drop(&mut self) {
        if let Some(link) = self.shared.link.lock().take() {
            link.cancel.cancel();
        }
    }
}

fn ws_error(e: tokio_tungstenite::tungstenite::Error) -> TransportError {
    TransportError::WebSocket(e.to_string())
}

async fn next_text(source: &mut WsSource) -> TransportResult<String> {
    loop {
        match source.next().await {
            Some(Ok(Message::Text(text))) => return Ok(text.as_str().to_string()),
            Some(Ok(Message::Close(_))) | None => {
                return Err(TransportError::ConnectionFailed(
                    "closed during handshake".to_string(),
                ))
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(ws_error(e)),
        }
    }
}

async fn handshake(request: &ConnectRequest) -> TransportResult<Handshaken> {
    let (url, namespace) = websocket_url(&request.address, &request.query)?;
    debug!(namespace = %namespace, "Opening WebSocket");

    let (ws, _response) = connect_async(url.as_str())
        .await
        .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;
    let (mut sink, mut source) = ws.split();

    let open = loop {
        match EnginePacket::decode(&next_text(&mut source).await?)? {
            EnginePacket::Open(info) => break info,
            other => trace!(?other, "Ignoring packet before open"),
        }
    };
    debug!(sid = %open.sid, ping_interval = open.ping_interval, "Engine session open");

    let connect = EnginePacket::Message(SocketPacket::connect(&namespace).encode());
    sink.send(Message::text(connect.encode()))
        .await
        .map_err(ws_error)?;

    loop {
        match EnginePacket::decode(&next_text(&mut source).await?)? {
            EnginePacket::Ping(probe) => {
                sink.send(Message::text(EnginePacket::Pong(probe).encode()))
                    .await
                    .map_err(ws_error)?;
            }
            EnginePacket::Message(body) => {
                let packet = SocketPacket::decode(&body)?;
                if packet.namespace != namespace {
                    continue;
                }
                match packet.kind {
                    PacketKind::Connect => break,
                    PacketKind::ConnectError => {
                        return Err(TransportError::Rejected(packet.error_message()))
                    }
                    _ => trace!(?packet, "Ignoring packet before namespace connect"),
                }
            }
            EnginePacket::Close => {
                return Err(TransportError::ConnectionFailed(
                    "server closed during handshake".to_string(),
                ))
            }
            _ => {}
        }
    }

    Ok(Handshaken {
        sink,
        source,
        open,
        namespace,
    })
}

/// A binary event waiting for its attachment frames.
struct PendingBinary {
    name: String,
    payload: serde_json::Value,
    expected: usize,
    attachments: Vec<Bytes>,
}

/// What to do after handling one inbound frame.
enum Flow {
    Continue,
    Reply(Message),
    Lost(String),
}

struct Reader {
    namespace: String,
    pending: Option<PendingBinary>,
    shared: Arc<Shared>,
}

impl Reader {
    fn on_text(&mut self, text: &str) -> Flow {
        let packet = match EnginePacket::decode(text) {
            Ok(packet) => packet,
            Err(e) => {
                warn!(channel = %self.shared.label, "Dropping bad frame: {}", e);
                return Flow::Continue;
            }
        };

        match packet {
            EnginePacket::Ping(probe) => {
                Flow::Reply(Message::text(EnginePacket::Pong(probe).encode()))
            }
            EnginePacket::Close => Flow::Lost("transport close".to_string()),
            EnginePacket::Message(body) => match SocketPacket::decode(&body) {
                Ok(packet) => self.on_packet(packet),
                Err(e) => {
                    warn!(channel = %self.shared.label, "Dropping bad packet: {}", e);
                    Flow::Continue
                }
            },
            _ => Flow::Continue,
        }
    }

    fn on_packet(&mut self, packet: SocketPacket) -> Flow {
        if packet.namespace != self.namespace {
            return Flow::Continue;
        }

        match packet.kind {
            PacketKind::Disconnect => Flow::Lost("io server disconnect".to_string()),
            PacketKind::Event | PacketKind::BinaryEvent => {
                let Some((name, payload)) = packet.event_parts() else {
                    return Flow::Continue;
                };
                if packet.attachments > 0 {
                    self.pending = Some(PendingBinary {
                        name,
                        payload,
                        expected: packet.attachments,
                        attachments: Vec::with_capacity(packet.attachments),
                    });
                } else {
                    self.shared.notify(InboundEvent::Event {
                        name,
                        payload,
                        attachments: Vec::new(),
                    });
                }
                Flow::Continue
            }
            _ => Flow::Continue,
        }
    }

    fn on_binary(&mut self, data: Bytes) {
        let Some(mut pending) = self.pending.take() else {
            trace!(channel = %self.shared.label, "Unexpected binary frame");
            return;
        };

        pending.attachments.push(data);
        if pending.attachments.len() < pending.expected {
            self.pending = Some(pending);
            return;
        }

        self.shared.notify(InboundEvent::Event {
            name: pending.name,
            payload: pending.payload,
            attachments: pending.attachments,
        });
    }
}

async fn write_frames(
    sink: &mut WsSink,
    frames: Vec<Message>,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    for frame in frames {
        sink.feed(frame).await?;
    }
    sink.flush().await
}

async fn run_io(
    handshaken: Handshaken,
    mut outbound: mpsc::UnboundedReceiver<Vec<Message>>,
    cancel: CancellationToken,
    shared: Arc<Shared>,
) {
    let Handshaken {
        mut sink,
        mut source,
        open,
        namespace,
    } = handshaken;

    let heartbeat = Duration::from_millis(open.heartbeat_ms());
    let mut deadline = Instant::now() + heartbeat;
    let mut reader = Reader {
        namespace,
        pending: None,
        shared: Arc::clone(&shared),
    };

    let lost = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break None,
            frames = outbound.recv() => match frames {
                Some(frames) => {
                    if let Err(e) = write_frames(&mut sink, frames).await {
                        break Some(format!("transport error: {e}"));
                    }
                }
                None => {
                    let _ = sink.send(Message::Close(None)).await;
                    break None;
                }
            },
            message = source.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    match reader.on_text(text.as_str()) {
                        Flow::Continue => {}
                        Flow::Reply(reply) => {
                            deadline = Instant::now() + heartbeat;
                            if let Err(e) = sink.send(reply).await {
                                break Some(format!("transport error: {e}"));
                            }
                        }
                        Flow::Lost(reason) => break Some(reason),
                    }
                }
                Some(Ok(Message::Binary(data))) => reader.on_binary(Bytes::from(data)),
                Some(Ok(Message::Close(_))) | None => break Some("transport close".to_string()),
                Some(Ok(_)) => {}
                Some(Err(e)) => break Some(format!("transport error: {e}")),
            },
            _ = sleep_until(deadline) => break Some("ping timeout".to_string()),
        }
    };

    if let Some(reason) = lost {
        shared.mark_lost(reason);
    }
    debug!(channel = %shared.label, "Channel IO task finished");
}
