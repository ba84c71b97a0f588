//! Error types for the capture module.

use thiserror::Error;

/// Errors that can occur during capture operations.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// The user or the OS refused access to the device.
    #[error("Permission denied for capture device")]
    PermissionDenied,

    /// No device matching the request exists.
    #[error("Capture device not found: {0}")]
    DeviceNotFound(String),

    /// Neither audio nor video was requested.
    #[error("At least one of audio or video must be requested")]
    NoTracksRequested,

    /// Capture already started.
    #[error("Capture already started")]
    AlreadyStarted,

    /// Device lost during capture.
    #[error("Capture device lost")]
    DeviceLost,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CaptureError {
    /// Returns true for failures the presenter can fix and retry
    /// (granting permission, plugging in a device).
    pub fn is_device_access(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied | Self::DeviceNotFound(_) | Self::NoTracksRequested
        )
    }
}
