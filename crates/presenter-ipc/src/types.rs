//! Common types used across IPC messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Who is broadcasting, and which session this is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionIdentity {
    /// Presenter (streamer) identifier.
    pub presenter_id: String,

    /// Session (stream) identifier.
    pub session_id: String,
}

impl SessionIdentity {
    /// Create a new identity.
    pub fn new(presenter_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            presenter_id: presenter_id.into(),
            session_id: session_id.into(),
        }
    }
}

/// One audience comment. The payload is opaque to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Comment(pub Value);

impl Comment {
    /// Wrap a raw payload.
    pub fn new(payload: Value) -> Self {
        Self(payload)
    }

    /// Borrow the raw payload.
    pub fn payload(&self) -> &Value {
        &self.0
    }

    /// Best-effort text for display: the `message` field, else the raw JSON.
    pub fn display_text(&self) -> String {
        match self.0.get("message").and_then(Value::as_str) {
            Some(text) => text.to_string(),
            None => self.0.to_string(),
        }
    }
}

/// Which tracks to request from the capture device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaConstraints {
    /// Request a video track.
    pub video: bool,

    /// Request an audio track.
    pub audio: bool,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            video: true,
            audio: true,
        }
    }
}

/// Capture unit settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// Chunk timer period in milliseconds (default: 1000).
    pub timeslice_ms: u64,

    /// Emit the partial buffer left after the last tick when releasing.
    pub flush_on_release: bool,

    /// Tracks to request.
    pub constraints: MediaConstraints,

    /// Container/codec of the produced chunks.
    pub mime_type: String,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            timeslice_ms: 1000,
            flush_on_release: false,
            constraints: MediaConstraints::default(),
            mime_type: "video/webm; codecs=vp8, opus".to_string(),
        }
    }
}

/// Configuration for a presenter session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Streaming channel address, including the namespace path
    /// (e.g., "http://ingest.example.com/stream").
    pub streaming_service: String,

    /// Comment service base URL (channel and upload endpoint).
    pub comment_service: String,

    /// Composition service base URL (`end_stream` endpoint).
    pub composition_service: String,

    /// Capture unit settings.
    pub capture: CaptureSettings,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            streaming_service: "http://localhost:5000/stream".to_string(),
            comment_service: "http://localhost:5001".to_string(),
            composition_service: "http://localhost:5002".to_string(),
            capture: CaptureSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_comment_display_prefers_message_field() {
        let comment = Comment::new(json!({"message": "hello", "user": "bob"}));
        assert_eq!(comment.display_text(), "hello");

        let raw = Comment::new(json!(["opaque", 1]));
        assert_eq!(raw.display_text(), "[\"opaque\",1]");
    }

    #[test]
    fn test_comment_serializes_as_bare_payload() {
        let comment = Comment::new(json!({"message": "hi"}));
        assert_eq!(serde_json::to_value(&comment).unwrap(), json!({"message": "hi"}));
    }
}
