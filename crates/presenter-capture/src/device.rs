//! Capture device abstraction.

use async_trait::async_trait;
use bytes::Bytes;

use presenter_ipc::MediaConstraints;

use crate::CaptureResult;

/// A live set of device tracks feeding a media buffer.
pub trait MediaStream: Send {
    /// Remove and return everything captured since the previous call.
    fn drain(&mut self) -> Bytes;

    /// Stop every track. Calling it again has no effect.
    fn stop_tracks(&mut self);

    /// Number of tracks still running.
    fn live_tracks(&self) -> usize;
}

/// Something that can grant exclusive access to a camera/microphone.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Request the device. Fails with `PermissionDenied` or `DeviceNotFound`
    /// when access cannot be granted.
    async fn acquire(&self, constraints: &MediaConstraints) -> CaptureResult<Box<dyn MediaStream>>;

    /// Short description for logs.
    fn describe(&self) -> String;
}
