//! Capture through an external recorder process.
//!
//! The process owns the camera/microphone and writes an encoded container
//! stream (e.g. ffmpeg producing WebM) to stdout; we buffer it until the
//! chunk timer drains it.

use std::io::ErrorKind;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use presenter_ipc::MediaConstraints;

use crate::device::{CaptureDevice, MediaStream};
use crate::error::CaptureError;
use crate::{CaptureResult, PROCESS_READ_CHUNK};

/// A capture device backed by a recorder command line.
#[derive(Debug, Clone)]
pub struct CommandDevice {
    program: String,
    args: Vec<String>,
}

impl CommandDevice {
    /// Create a device that runs `program` with `args`.
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Split a whitespace-separated command line. Returns `None` when empty.
    pub fn from_command_line(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect()))
    }
}

#[async_trait]
impl CaptureDevice for CommandDevice {
    #[instrument(name = "command_device_acquire", skip(self), fields(program = %self.program))]
    async fn acquire(
        &self,
        constraints: &MediaConstraints,
    ) -> CaptureResult<Box<dyn MediaStream>> {
        let tracks = usize::from(constraints.video) + usize::from(constraints.audio);
        if tracks == 0 {
            return Err(CaptureError::NoTracksRequested);
        }

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::PermissionDenied => CaptureError::PermissionDenied,
                ErrorKind::NotFound => CaptureError::DeviceNotFound(self.program.clone()),
                _ => CaptureError::Io(e),
            })?;

        let stdout = child.stdout.take().ok_or(CaptureError::DeviceLost)?;
        let buffer = Arc::new(Mutex::new(BytesMut::new()));
        let running = Arc::new(AtomicBool::new(true));

        let reader = tokio::spawn(read_output(
            stdout,
            Arc::clone(&buffer),
            Arc::clone(&running),
        ));

        info!(tracks, "Recorder process started");

        Ok(Box::new(ProcessStream {
            child: Some(child),
            reader: Some(reader),
            buffer,
            running,
            tracks,
        }))
    }

    fn describe(&self) -> String {
        format!("command:{}", self.program)
    }
}

async fn read_output(
    mut stdout: ChildStdout,
    buffer: Arc<Mutex<BytesMut>>,
    running: Arc<AtomicBool>,
) {
    let mut scratch = vec![0u8; PROCESS_READ_CHUNK];

    loop {
        match stdout.read(&mut scratch).await {
            Ok(0) => {
                if running.swap(false, Ordering::SeqCst) {
                    info!("Recorder output ended");
                }
                break;
            }
            Ok(n) => buffer.lock().extend_from_slice(&scratch[..n]),
            Err(e) => {
                warn!("Recorder read error: {}", e);
                running.store(false, Ordering::SeqCst);
                break;
            }
        }
    }

    debug!("Recorder reader finished");
}

struct ProcessStream {
    child: Option<Child>,
    reader: Option<JoinHandle<()>>,
    buffer: Arc<Mutex<BytesMut>>,
    running: Arc<AtomicBool>,
    tracks: usize,
}

impl MediaStream for ProcessStream {
    fn drain(&mut self) -> Bytes {
        self.buffer.lock().split().freeze()
    }

    fn stop_tracks(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        if let Some(reader) = self.reader.take() {
            reader.abort();
        }

        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.start_kill() {
                debug!("Recorder already exited: {}", e);
            }
            reap(child);
            info!("Recorder process stopped");
        }
    }

    fn live_tracks(&self) -> usize {
        if self.child.is_some() && self.running.load(Ordering::SeqCst) {
            self.tracks
        } else {
            0
        }
    }
}

/// Wait for a killed recorder so it does not linger as a zombie.
fn reap(mut child: Child) {
    match Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                match child.wait().await {
                    Ok(status) => debug!(%status, "Recorder process reaped"),
                    Err(e) => warn!("Failed to reap recorder: {}", e),
                }
            });
        }
        Err(_) => {
            if let Err(e) = child.try_wait() {
                warn!("Failed to reap recorder: {}", e);
            }
        }
    }
}

impl Drop for ProcessStream {
    fn drop(&mut self) {
        self.stop_tracks();
    }
}
