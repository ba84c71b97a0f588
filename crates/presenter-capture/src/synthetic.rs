//! Generated capture source for offline runs and tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use tracing::debug;

use presenter_ipc::MediaConstraints;

use crate::device::{CaptureDevice, MediaStream};
use crate::error::CaptureError;
use crate::CaptureResult;

const PAYLOAD_TAG: &[u8] = b"synthetic-media";

/// Payload produced by the `index`-th drain of a synthetic stream.
pub fn synthetic_payload(index: u64) -> Bytes {
    let mut buf = BytesMut::with_capacity(PAYLOAD_TAG.len() + 8);
    buf.put_slice(PAYLOAD_TAG);
    buf.put_u64(index);
    buf.freeze()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Availability {
    Available,
    PermissionDenied,
    Missing,
}

/// A device that produces [`synthetic_payload`] slices, one per drain.
///
/// Clones share the live-track counter, so a test can keep a clone and check
/// that every track handed out has been stopped.
#[derive(Debug, Clone)]
pub struct SyntheticDevice {
    availability: Availability,
    live_tracks: Arc<AtomicUsize>,
    lifetime: Option<u64>,
}

impl SyntheticDevice {
    /// A device that grants access.
    pub fn new() -> Self {
        Self {
            availability: Availability::Available,
            live_tracks: Arc::new(AtomicUsize::new(0)),
            lifetime: None,
        }
    }

    /// A device whose tracks end on their own after `drains` slices.
    pub fn lost_after(drains: u64) -> Self {
        Self {
            lifetime: Some(drains),
            ..Self::new()
        }
    }

    /// A device whose permission prompt is always refused.
    pub fn denied() -> Self {
        Self {
            availability: Availability::PermissionDenied,
            ..Self::new()
        }
    }

    /// No device attached.
    pub fn missing() -> Self {
        Self {
            availability: Availability::Missing,
            ..Self::new()
        }
    }

    /// Tracks currently running across every stream this device handed out.
    pub fn live_tracks(&self) -> usize {
        self.live_tracks.load(Ordering::SeqCst)
    }
}

impl Default for SyntheticDevice {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptureDevice for SyntheticDevice {
    async fn acquire(&self, constraints: &MediaConstraints) -> CaptureResult<Box<dyn MediaStream>> {
        match self.availability {
            Availability::PermissionDenied => return Err(CaptureError::PermissionDenied),
            Availability::Missing => {
                return Err(CaptureError::DeviceNotFound("synthetic".to_string()))
            }
            Availability::Available => {}
        }

        let tracks = usize::from(constraints.video) + usize::from(constraints.audio);
        if tracks == 0 {
            return Err(CaptureError::NoTracksRequested);
        }

        self.live_tracks.fetch_add(tracks, Ordering::SeqCst);
        debug!(tracks, "Synthetic device acquired");

        Ok(Box::new(SyntheticStream {
            tracks,
            next_index: 0,
            lifetime: self.lifetime,
            live_tracks: Arc::clone(&self.live_tracks),
        }))
    }

    fn describe(&self) -> String {
        "synthetic".to_string()
    }
}

struct SyntheticStream {
    tracks: usize,
    next_index: u64,
    lifetime: Option<u64>,
    live_tracks: Arc<AtomicUsize>,
}

impl MediaStream for SyntheticStream {
    fn drain(&mut self) -> Bytes {
        if self.tracks == 0 {
            return Bytes::new();
        }
        if self.lifetime == Some(self.next_index) {
            debug!("Synthetic tracks ended");
            self.stop_tracks();
            return Bytes::new();
        }
        let payload = synthetic_payload(self.next_index);
        self.next_index += 1;
        payload
    }

    fn stop_tracks(&mut self) {
        if self.tracks > 0 {
            self.live_tracks.fetch_sub(self.tracks, Ordering::SeqCst);
            self.tracks = 0;
        }
    }

    fn live_tracks(&self) -> usize {
        self.tracks
    }
}

impl Drop for SyntheticStream {
    fn drop(&mut self) {
        self.stop_tracks();
    }
}
