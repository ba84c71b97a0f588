//! Capture unit: owns the device stream and the chunk timer.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

use presenter_ipc::CaptureSettings;

use crate::chunk::MediaChunk;
use crate::device::{CaptureDevice, MediaStream};
use crate::error::CaptureError;
use crate::CaptureResult;

/// Receives every chunk the timer cuts, in order.
pub type ChunkSink = Arc<dyn Fn(MediaChunk) + Send + Sync>;

/// Called once when the held stream stops on its own.
pub type LossHandler = Arc<dyn Fn(CaptureError) + Send + Sync>;

type SharedStream = Arc<Mutex<Box<dyn MediaStream>>>;

struct ActiveCapture {
    stream: SharedStream,
    cancel: CancellationToken,
    timer: JoinHandle<u64>,
    sink: ChunkSink,
}

/// Owns at most one live device stream and slices it on a fixed interval.
pub struct CaptureUnit {
    device: Arc<dyn CaptureDevice>,
    settings: CaptureSettings,
    on_lost: Option<LossHandler>,
    active: Option<ActiveCapture>,
}

impl CaptureUnit {
    /// Create an idle capture unit.
    pub fn new(device: Arc<dyn CaptureDevice>, settings: CaptureSettings) -> Self {
        Self {
            device,
            settings,
            on_lost: None,
            active: None,
        }
    }

    /// Report device loss to `handler`. The timer stops cutting chunks once
    /// every track has ended.
    pub fn on_device_lost(mut self, handler: LossHandler) -> Self {
        self.on_lost = Some(handler);
        self
    }

    /// Acquire the device and start the chunk timer.
    #[instrument(name = "capture_acquire", skip_all, fields(device = %self.device.describe()))]
    pub async fn acquire(&mut self, sink: ChunkSink) -> CaptureResult<()> {
        if self.active.is_some() {
            return Err(CaptureError::AlreadyStarted);
        }

        let stream = self.device.acquire(&self.settings.constraints).await?;
        let stream: SharedStream = Arc::new(Mutex::new(stream));
        let cancel = CancellationToken::new();
        let period = Duration::from_millis(self.settings.timeslice_ms.max(1));

        let timer = tokio::spawn(run_chunk_timer(
            Arc::clone(&stream),
            Arc::clone(&sink),
            cancel.clone(),
            period,
            self.on_lost.clone(),
        ));

        self.active = Some(ActiveCapture {
            stream,
            cancel,
            timer,
            sink,
        });

        info!(
            timeslice_ms = self.settings.timeslice_ms,
            mime_type = %self.settings.mime_type,
            "Capture started"
        );
        Ok(())
    }

    /// Stop the timer, stop every track and drop the stream.
    ///
    /// Once this returns, the sink will not be called again. Calling it while
    /// nothing is active does nothing.
    #[instrument(name = "capture_release", skip(self))]
    pub async fn release(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };

        active.cancel.cancel();
        let next_sequence = match active.timer.await {
            Ok(sequence) => sequence,
            Err(e) => {
                warn!("Chunk timer ended abnormally: {}", e);
                0
            }
        };

        let mut stream = active.stream.lock();
        if self.settings.flush_on_release {
            let rest = stream.drain();
            if !rest.is_empty() {
                debug!(bytes = rest.len(), "Flushing final partial chunk");
                (active.sink)(MediaChunk::new(rest, next_sequence));
            }
        }
        stream.stop_tracks();

        info!("Capture released");
    }

    /// Returns true while a stream is held.
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Tracks still running in the held stream (0 when released).
    pub fn live_tracks(&self) -> usize {
        self.active
            .as_ref()
            .map(|active| active.stream.lock().live_tracks())
            .unwrap_or(0)
    }
}

impl Drop for CaptureUnit {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
            active.timer.abort();
            active.stream.lock().stop_tracks();
        }
    }
}

/// Cuts one chunk per period until cancelled or until the stream has no
/// live tracks left. Returns the next unused sequence number.
async fn run_chunk_timer(
    stream: SharedStream,
    sink: ChunkSink,
    cancel: CancellationToken,
    period: Duration,
    on_lost: Option<LossHandler>,
) -> u64 {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut sequence = 0u64;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let (data, live_tracks) = {
                    let mut stream = stream.lock();
                    (stream.drain(), stream.live_tracks())
                };

                if data.is_empty() {
                    trace!("Empty slice skipped");
                } else {
                    trace!(sequence, bytes = data.len(), "Chunk cut");
                    sink(MediaChunk::new(data, sequence));
                    sequence += 1;
                }

                if live_tracks == 0 {
                    warn!(chunks = sequence, "{}", CaptureError::DeviceLost);
                    if let Some(ref on_lost) = on_lost {
                        on_lost(CaptureError::DeviceLost);
                    }
                    break;
                }
            }
        }
    }

    debug!(chunks = sequence, "Chunk timer stopped");
    sequence
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::{synthetic_payload, SyntheticDevice};
    use bytes::Bytes;

    fn collecting_sink() -> (ChunkSink, Arc<Mutex<Vec<MediaChunk>>>) {
        let chunks = Arc::new(Mutex::new(Vec::new()));
        let target = Arc::clone(&chunks);
        let sink: ChunkSink = Arc::new(move |chunk| target.lock().push(chunk));
        (sink, chunks)
    }

    fn unit_for(device: &SyntheticDevice, settings: CaptureSettings) -> CaptureUnit {
        CaptureUnit::new(Arc::new(device.clone()), settings)
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_emits_one_chunk_per_period_in_order() {
        let device = SyntheticDevice::new();
        let mut unit = unit_for(&device, CaptureSettings::default());
        let (sink, chunks) = collecting_sink();

        unit.acquire(sink).await.unwrap();
        tokio::time::sleep(Duration::from_millis(3500)).await;
        unit.release().await;

        let chunks = chunks.lock();
        let payloads: Vec<Bytes> = chunks.iter().map(|c| c.data.clone()).collect();
        assert_eq!(
            payloads,
            vec![synthetic_payload(0), synthetic_payload(1), synthetic_payload(2)]
        );
        let sequences: Vec<u64> = chunks.iter().map(|c| c.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_chunk_before_first_period_elapses() {
        let device = SyntheticDevice::new();
        let mut unit = unit_for(&device, CaptureSettings::default());
        let (sink, chunks) = collecting_sink();

        unit.acquire(sink).await.unwrap();
        tokio::time::sleep(Duration::from_millis(999)).await;
        unit.release().await;

        assert!(chunks.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_release_is_idempotent_and_stops_tracks() {
        let device = SyntheticDevice::new();
        let mut unit = unit_for(&device, CaptureSettings::default());
        let (sink, _chunks) = collecting_sink();

        unit.acquire(sink).await.unwrap();
        assert_eq!(device.live_tracks(), 2);
        assert_eq!(unit.live_tracks(), 2);

        unit.release().await;
        unit.release().await;

        assert!(!unit.is_active());
        assert_eq!(device.live_tracks(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_chunks_after_release() {
        let device = SyntheticDevice::new();
        let mut unit = unit_for(&device, CaptureSettings::default());
        let (sink, chunks) = collecting_sink();

        unit.acquire(sink).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        unit.release().await;
        let seen = chunks.lock().len();

        tokio::time::sleep(Duration::from_millis(5000)).await;
        assert_eq!(chunks.lock().len(), seen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_on_release_emits_partial_chunk() {
        let device = SyntheticDevice::new();
        let settings = CaptureSettings {
            flush_on_release: true,
            ..CaptureSettings::default()
        };
        let mut unit = unit_for(&device, settings);
        let (sink, chunks) = collecting_sink();

        unit.acquire(sink).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;
        unit.release().await;

        let chunks = chunks.lock();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].sequence, 1);
        assert_eq!(chunks[1].data, synthetic_payload(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_device_loss_stops_timer_and_is_reported() {
        let device = SyntheticDevice::lost_after(2);
        let losses = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&losses);
        let on_lost: LossHandler = Arc::new(move |e: CaptureError| seen.lock().push(e));
        let mut unit = CaptureUnit::new(Arc::new(device.clone()), CaptureSettings::default())
            .on_device_lost(on_lost);
        let (sink, chunks) = collecting_sink();

        unit.acquire(sink).await.unwrap();
        tokio::time::sleep(Duration::from_millis(6500)).await;

        let sequences: Vec<u64> = chunks.lock().iter().map(|c| c.sequence).collect();
        assert_eq!(sequences, vec![0, 1]);
        assert_eq!(losses.lock().len(), 1);
        assert!(matches!(losses.lock()[0], CaptureError::DeviceLost));
        assert_eq!(unit.live_tracks(), 0);

        unit.release().await;
        assert!(!unit.is_active());
        assert_eq!(losses.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_second_acquire_is_rejected() {
        let device = SyntheticDevice::new();
        let mut unit = unit_for(&device, CaptureSettings::default());
        let (sink, _chunks) = collecting_sink();

        unit.acquire(Arc::clone(&sink)).await.unwrap();
        let err = unit.acquire(sink).await.unwrap_err();
        assert!(matches!(err, CaptureError::AlreadyStarted));
        assert_eq!(device.live_tracks(), 2);

        unit.release().await;
    }

    #[tokio::test]
    async fn test_denied_device_leaves_unit_idle() {
        let device = SyntheticDevice::denied();
        let mut unit = unit_for(&device, CaptureSettings::default());
        let (sink, _chunks) = collecting_sink();

        let err = unit.acquire(sink).await.unwrap_err();
        assert!(err.is_device_access());
        assert!(!unit.is_active());
        unit.release().await;
    }
}
