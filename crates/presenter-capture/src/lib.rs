//! Camera/microphone acquisition and timed media chunking.
//!
//! A [`CaptureDevice`] hands out a live [`MediaStream`]; the [`CaptureUnit`]
//! owns that stream and slices it into [`MediaChunk`]s on a fixed timer.

mod chunk;
mod command;
mod device;
mod error;
mod synthetic;
mod unit;

pub use chunk::MediaChunk;
pub use command::CommandDevice;
pub use device::{CaptureDevice, MediaStream};
pub use error::CaptureError;
pub use synthetic::{synthetic_payload, SyntheticDevice};
pub use unit::{CaptureUnit, ChunkSink, LossHandler};

/// Result type for capture operations.
pub type CaptureResult<T> = Result<T, CaptureError>;

/// Default chunk timer period in milliseconds.
pub const DEFAULT_TIMESLICE_MS: u64 = 1000;

/// Read buffer size for external capture processes.
pub const PROCESS_READ_CHUNK: usize = 64 * 1024;
