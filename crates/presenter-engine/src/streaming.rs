//! Streaming channel: carries media chunks to the ingestion service.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, instrument, trace};
use url::Url;

use presenter_capture::{ChunkSink, MediaChunk};
use presenter_ipc::SessionIdentity;
use presenter_transport::{
    ConnectRequest, ConnectionState, EventChannel, OutboundEvent, TransportResult,
};

use crate::credentials::Credentials;
use crate::statistics::{StatisticsCollector, StreamingStatistics};

/// Announces a session.
pub const START_STREAM_EVENT: &str = "start_stream";

/// Carries one media chunk.
pub const VIDEO_DATA_EVENT: &str = "video_data";

/// Ends a session.
pub const STOP_STREAM_EVENT: &str = "stop_stream";

/// Typed wrapper over the ingestion [`EventChannel`].
///
/// Clones share the underlying channel and counters, so a clone can live
/// inside the capture unit's chunk sink.
#[derive(Clone)]
pub struct StreamingChannel {
    channel: Arc<dyn EventChannel>,
    statistics: Arc<StatisticsCollector>,
}

impl StreamingChannel {
    /// Wrap an event channel.
    pub fn new(channel: Arc<dyn EventChannel>) -> Self {
        Self {
            channel,
            statistics: Arc::new(StatisticsCollector::default()),
        }
    }

    /// Connect with the stored tokens. Absent tokens are left out of the
    /// handshake query.
    #[instrument(name = "streaming_connect", skip_all, fields(address = %address))]
    pub async fn connect(&self, address: &Url, credentials: &Credentials) -> TransportResult<()> {
        self.statistics.reset();

        let request = ConnectRequest::new(address.clone())
            .query_param("access_token", credentials.access_token.as_deref())
            .query_param("refresh_token", credentials.refresh_token.as_deref());

        self.channel.connect(request).await?;
        info!("Streaming channel connected");
        Ok(())
    }

    /// Emit `start_stream`. Returns false if the channel is down.
    pub fn send_start(&self, identity: &SessionIdentity) -> bool {
        let sent = self.channel.send(OutboundEvent::json(
            START_STREAM_EVENT,
            json!({
                "user_id": identity.presenter_id,
                "stream_id": identity.session_id,
            }),
        ));
        debug!(sent, "start_stream");
        sent
    }

    /// Emit one chunk as `video_data`. While disconnected the chunk is
    /// dropped and counted.
    pub fn send_chunk(&self, chunk: MediaChunk) -> bool {
        let bytes = chunk.len() as u64;
        let sequence = chunk.sequence;
        let event = OutboundEvent::binary_field(VIDEO_DATA_EVENT, "data", chunk.data);

        if self.channel.send(event) {
            trace!(sequence, bytes, "Chunk sent");
            self.statistics.record_sent(bytes);
            true
        } else {
            trace!(sequence, bytes, "Streaming channel down, chunk dropped");
            self.statistics.record_drop();
            false
        }
    }

    /// Emit `stop_stream`. Returns false if the channel is down.
    pub fn send_stop(&self) -> bool {
        let sent = self.channel.send(OutboundEvent::bare(STOP_STREAM_EVENT));
        debug!(sent, "stop_stream");
        sent
    }

    /// Close the channel. Later sends are no-ops.
    pub async fn disconnect(&self) {
        self.channel.disconnect().await;
    }

    /// A sink that forwards every chunk through [`Self::send_chunk`].
    pub fn chunk_sink(&self) -> ChunkSink {
        let channel = self.clone();
        Arc::new(move |chunk| {
            channel.send_chunk(chunk);
        })
    }

    /// Current connectivity.
    pub fn state(&self) -> ConnectionState {
        self.channel.state()
    }

    /// Check if connected.
    pub fn is_connected(&self) -> bool {
        self.channel.is_connected()
    }

    /// Counters since the last connect.
    pub fn statistics(&self) -> StreamingStatistics {
        self.statistics.snapshot()
    }
}
