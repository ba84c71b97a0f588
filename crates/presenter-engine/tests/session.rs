//! Controller scenarios against in-memory channels and a synthetic device.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use crossbeam_channel::Receiver;
use parking_lot::Mutex;
use serde_json::json;

use presenter_api::{ApiError, ApiResult, CommentPoster, TerminationNotifier, TerminationRequest};
use presenter_capture::{synthetic_payload, SyntheticDevice};
use presenter_engine::{
    Collaborators, Credentials, SessionController, StaticCredentials, REGISTER_EVENT,
    START_STREAM_EVENT, STOP_STREAM_EVENT, VIDEO_DATA_EVENT,
};
use presenter_ipc::{
    ErrorKind, SessionConfig, SessionEvent, SessionIdentity, SessionState, ShutdownPhase,
};
use presenter_transport::{ChannelRecord, EventChannel, InboundEvent, MemoryChannel, OutboundEvent};

#[derive(Default)]
struct RecordingNotifier {
    requests: Mutex<Vec<TerminationRequest>>,
    reject_with: Option<String>,
}

#[async_trait]
impl TerminationNotifier for RecordingNotifier {
    async fn notify_end(&self, request: &TerminationRequest) -> ApiResult<()> {
        self.requests.lock().push(request.clone());
        match self.reject_with {
            Some(ref message) => Err(ApiError::Rejected {
                status: 404,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
struct RecordingPoster {
    messages: Mutex<Vec<String>>,
    fail: bool,
}

#[async_trait]
impl CommentPoster for RecordingPoster {
    async fn post_comment(&self, message: &str) -> ApiResult<()> {
        self.messages.lock().push(message.to_string());
        if self.fail {
            Err(ApiError::Status { status: 500 })
        } else {
            Ok(())
        }
    }
}

struct Harness {
    controller: SessionController,
    events: Receiver<SessionEvent>,
    streaming: MemoryChannel,
    comments: MemoryChannel,
    device: SyntheticDevice,
    notifier: Arc<RecordingNotifier>,
    poster: Arc<RecordingPoster>,
}

impl Harness {
    fn new() -> Self {
        Self::build(
            MemoryChannel::new(),
            SyntheticDevice::new(),
            RecordingNotifier::default(),
            RecordingPoster::default(),
        )
    }

    fn build(
        streaming: MemoryChannel,
        device: SyntheticDevice,
        notifier: RecordingNotifier,
        poster: RecordingPoster,
    ) -> Self {
        let comments = MemoryChannel::new();
        let notifier = Arc::new(notifier);
        let poster = Arc::new(poster);
        let (event_tx, events) = crossbeam_channel::unbounded();

        let collaborators = Collaborators {
            streaming_channel: Arc::new(streaming.clone()),
            comment_channel: Arc::new(comments.clone()),
            device: Arc::new(device.clone()),
            credentials: Arc::new(StaticCredentials::new(Credentials::new(
                Some("access".to_string()),
                None,
            ))),
            poster: Arc::clone(&poster) as Arc<dyn CommentPoster>,
            notifier: Arc::clone(&notifier) as Arc<dyn TerminationNotifier>,
        };

        let controller = SessionController::new(
            SessionConfig::default(),
            SessionIdentity::new("alice", "42"),
            collaborators,
            event_tx,
        )
        .unwrap();

        Self {
            controller,
            events,
            streaming,
            comments,
            device,
            notifier,
            poster,
        }
    }

    fn drain_events(&self) -> Vec<SessionEvent> {
        self.events.try_iter().collect()
    }
}

fn errors(events: &[SessionEvent]) -> Vec<(ErrorKind, String)> {
    events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::Error { kind, message, .. } => Some((*kind, message.clone())),
            _ => None,
        })
        .collect()
}

fn states(events: &[SessionEvent]) -> Vec<&'static str> {
    events
        .iter()
        .filter_map(|event| match event {
            SessionEvent::StateChanged { current, .. } => Some(current.name()),
            _ => None,
        })
        .collect()
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(20)).await;
}

#[tokio::test(start_paused = true)]
async fn test_three_ticks_send_three_chunks_in_order() {
    let mut harness = Harness::new();

    harness.controller.start().await;
    assert!(harness.controller.state().is_streaming());

    tokio::time::sleep(Duration::from_millis(3500)).await;
    harness.controller.stop().await.unwrap();

    let chunks = harness.streaming.sent_named(VIDEO_DATA_EVENT);
    let payloads: Vec<_> = chunks.iter().map(|e| e.attachments.clone()).collect();
    assert_eq!(
        payloads,
        vec![
            vec![synthetic_payload(0)],
            vec![synthetic_payload(1)],
            vec![synthetic_payload(2)],
        ]
    );

    let sent = harness.streaming.sent();
    assert_eq!(
        sent.first(),
        Some(&OutboundEvent::json(
            START_STREAM_EVENT,
            json!({"user_id": "alice", "stream_id": "42"})
        ))
    );
    assert_eq!(sent.last(), Some(&OutboundEvent::bare(STOP_STREAM_EVENT)));
    assert_eq!(harness.controller.statistics().sent_chunks, 3);
}

#[tokio::test(start_paused = true)]
async fn test_recorder_loss_is_reported_as_device_error() {
    let mut harness = Harness::build(
        MemoryChannel::new(),
        SyntheticDevice::lost_after(2),
        RecordingNotifier::default(),
        RecordingPoster::default(),
    );

    harness.controller.start().await;
    harness.drain_events();
    tokio::time::sleep(Duration::from_millis(5500)).await;

    assert_eq!(
        errors(&harness.drain_events()),
        vec![(ErrorKind::DeviceAccess, "Capture device lost".to_string())]
    );
    assert!(harness.controller.state().is_streaming());
    assert_eq!(harness.controller.live_tracks(), 0);
    assert_eq!(harness.streaming.sent_named(VIDEO_DATA_EVENT).len(), 2);

    harness.controller.stop().await.unwrap();
    assert_eq!(harness.controller.state(), &SessionState::Idle);
    assert_eq!(harness.device.live_tracks(), 0);
    assert_eq!(
        harness.streaming.sent().last(),
        Some(&OutboundEvent::bare(STOP_STREAM_EVENT))
    );
}

#[tokio::test(start_paused = true)]
async fn test_start_walks_phases_then_streams() {
    let mut harness = Harness::new();

    harness.controller.start().await;

    assert_eq!(
        states(&harness.drain_events()),
        vec![
            "Initializing",
            "Initializing",
            "Initializing",
            "Initializing",
            "Streaming",
        ]
    );
    assert_eq!(
        harness.streaming.journal()[0],
        ChannelRecord::Connected {
            query: vec![("access_token".to_string(), "access".to_string())],
        }
    );

    harness.controller.stop().await.unwrap();
}

#[tokio::test]
async fn test_double_stop_is_idempotent() {
    let mut harness = Harness::new();

    harness.controller.start().await;
    harness.controller.stop().await.unwrap();
    harness.drain_events();
    harness.controller.stop().await.unwrap();

    assert_eq!(harness.controller.state(), &SessionState::Idle);
    assert_eq!(harness.device.live_tracks(), 0);
    assert_eq!(harness.notifier.requests.lock().len(), 1);
    assert!(states(&harness.drain_events()).is_empty());
}

#[tokio::test]
async fn test_stop_runs_phases_in_fixed_order() {
    let mut harness = Harness::new();

    harness.controller.start().await;
    harness.drain_events();
    harness.controller.stop().await.unwrap();

    let phases: Vec<ShutdownPhase> = harness
        .drain_events()
        .into_iter()
        .filter_map(|event| match event {
            SessionEvent::StateChanged { current, .. } => match *current {
                SessionState::Stopping { phase } => Some(phase),
                _ => None,
            },
            _ => None,
        })
        .collect();

    assert_eq!(
        phases,
        vec![
            ShutdownPhase::ReleaseCapture,
            ShutdownPhase::AnnounceStop,
            ShutdownPhase::DisconnectStreaming,
            ShutdownPhase::CloseComments,
            ShutdownPhase::NotifyTermination,
        ]
    );
    assert_eq!(
        harness.notifier.requests.lock().as_slice(),
        &[TerminationRequest {
            streamer_id: "alice".to_string(),
            session_id: "42".to_string(),
        }]
    );
}

#[tokio::test]
async fn test_stop_from_idle_does_not_notify() {
    let mut harness = Harness::new();

    harness.controller.stop().await.unwrap();

    assert!(harness.notifier.requests.lock().is_empty());
    assert!(harness.streaming.journal().is_empty());
    assert!(harness.drain_events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_no_send_after_streaming_disconnect() {
    let mut harness = Harness::new();

    harness.controller.start().await;
    tokio::time::sleep(Duration::from_millis(2500)).await;
    harness.controller.stop().await.unwrap();
    tokio::time::sleep(Duration::from_millis(5000)).await;

    let journal = harness.streaming.journal();
    let disconnect = journal
        .iter()
        .position(|record| *record == ChannelRecord::Disconnected)
        .unwrap();
    assert_eq!(disconnect, journal.len() - 1);
    assert_eq!(
        journal[disconnect - 1],
        ChannelRecord::Sent(OutboundEvent::bare(STOP_STREAM_EVENT))
    );
}

#[tokio::test(start_paused = true)]
async fn test_chunks_while_disconnected_are_dropped() {
    let mut harness = Harness::new();

    harness.controller.start().await;
    harness.streaming.inject(InboundEvent::Disconnected {
        reason: "transport close".into(),
    });
    tokio::time::sleep(Duration::from_millis(2500)).await;

    assert!(harness.controller.state().is_streaming());
    assert!(harness.streaming.sent_named(VIDEO_DATA_EVENT).is_empty());
    assert_eq!(harness.controller.statistics().dropped_chunks, 2);

    harness.controller.stop().await.unwrap();
    assert!(harness.streaming.sent_named(STOP_STREAM_EVENT).is_empty());
}

#[tokio::test]
async fn test_denied_device_rolls_back_and_can_retry() {
    let mut harness = Harness::build(
        MemoryChannel::new(),
        SyntheticDevice::denied(),
        RecordingNotifier::default(),
        RecordingPoster::default(),
    );

    harness.controller.start().await;

    assert!(harness.controller.state().is_error());
    assert!(harness.controller.state().accepts_start());
    assert_eq!(harness.device.live_tracks(), 0);
    assert!(!harness.streaming.is_connected());
    assert!(harness.streaming.sent().is_empty());

    let errors = errors(&harness.drain_events());
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, ErrorKind::DeviceAccess);

    harness.controller.start().await;
    assert!(harness.controller.state().is_error());
    assert_eq!(harness.streaming.connections(), 2);
    assert_eq!(harness.comments.connections(), 1);

    harness.controller.stop().await.unwrap();
    assert_eq!(harness.controller.state(), &SessionState::Idle);
    assert_eq!(harness.device.live_tracks(), 0);
    assert!(!harness.comments.is_connected());
}

#[tokio::test]
async fn test_comments_keep_flowing_after_denied_device() {
    let mut harness = Harness::build(
        MemoryChannel::new(),
        SyntheticDevice::denied(),
        RecordingNotifier::default(),
        RecordingPoster::default(),
    );

    harness.controller.start().await;
    assert!(harness.controller.state().is_error());
    assert!(harness.comments.is_connected());

    harness.comments.inject(InboundEvent::Event {
        name: "new_comment".to_string(),
        payload: json!({ "message": "are you there?" }),
        attachments: Vec::new(),
    });
    settle().await;

    let texts: Vec<String> = harness
        .controller
        .comments()
        .iter()
        .map(|c| c.display_text())
        .collect();
    assert_eq!(texts, vec!["are you there?"]);
    assert!(harness
        .drain_events()
        .iter()
        .any(|event| matches!(event, SessionEvent::CommentReceived(_))));

    harness.controller.stop().await.unwrap();
}

#[tokio::test]
async fn test_comment_registration_uses_session_id() {
    let mut harness = Harness::new();

    harness.controller.start().await;
    settle().await;

    assert_eq!(
        harness.comments.sent_named(REGISTER_EVENT),
        vec![OutboundEvent::json(
            REGISTER_EVENT,
            json!({"streamer_id": "42"})
        )]
    );

    harness.controller.stop().await.unwrap();
    assert_eq!(harness.notifier.requests.lock()[0].streamer_id, "alice");
}

#[tokio::test]
async fn test_refused_channel_is_reported_and_session_continues() {
    let mut harness = Harness::build(
        MemoryChannel::refusing("connection refused"),
        SyntheticDevice::new(),
        RecordingNotifier::default(),
        RecordingPoster::default(),
    );

    harness.controller.start().await;

    assert!(harness.controller.state().is_streaming());
    let errors = errors(&harness.drain_events());
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, ErrorKind::ChannelConnection);

    harness.controller.stop().await.unwrap();
    assert!(harness.streaming.sent().is_empty());
}

#[tokio::test]
async fn test_start_while_streaming_is_ignored() {
    let mut harness = Harness::new();

    harness.controller.start().await;
    harness.drain_events();
    harness.controller.start().await;

    assert!(harness.drain_events().is_empty());
    assert_eq!(harness.streaming.connections(), 1);
    assert_eq!(harness.device.live_tracks(), 2);

    harness.controller.stop().await.unwrap();
    assert_eq!(harness.device.live_tracks(), 0);
}

#[tokio::test]
async fn test_termination_failure_surfaces_message_and_ends_idle() {
    let mut harness = Harness::build(
        MemoryChannel::new(),
        SyntheticDevice::new(),
        RecordingNotifier {
            reject_with: Some("session not found".to_string()),
            ..RecordingNotifier::default()
        },
        RecordingPoster::default(),
    );

    harness.controller.start().await;
    harness.drain_events();
    let err = harness.controller.stop().await.unwrap_err();

    assert_eq!(err.to_string(), "session not found");
    assert_eq!(harness.controller.state(), &SessionState::Idle);
    assert_eq!(
        errors(&harness.drain_events()),
        vec![(ErrorKind::Request, "session not found".to_string())]
    );
}

#[tokio::test]
async fn test_every_comment_connect_registers_once() {
    let mut harness = Harness::new();

    harness.controller.start().await;
    for _ in 0..2 {
        harness.comments.inject(InboundEvent::Disconnected {
            reason: "ping timeout".into(),
        });
        harness.comments.inject(InboundEvent::Connected);
    }
    settle().await;

    let registrations = harness.comments.sent_named(REGISTER_EVENT);
    assert_eq!(registrations.len(), 3);
    assert!(registrations
        .iter()
        .all(|e| e.payload == Some(json!({"streamer_id": "42"}))));

    harness.controller.stop().await.unwrap();
}

#[tokio::test]
async fn test_comments_keep_arrival_order() {
    let mut harness = Harness::new();

    harness.controller.start().await;
    for text in ["c1", "c2", "c3"] {
        harness.comments.inject(InboundEvent::Event {
            name: "new_comment".to_string(),
            payload: json!({ "message": text }),
            attachments: Vec::new(),
        });
    }
    settle().await;

    let texts: Vec<String> = harness
        .controller
        .comments()
        .iter()
        .map(|c| c.display_text())
        .collect();
    assert_eq!(texts, vec!["c1", "c2", "c3"]);

    harness.controller.stop().await.unwrap();
    assert_eq!(harness.controller.comments().len(), 3);
}

#[tokio::test]
async fn test_failed_comment_upload_is_reported() {
    let harness = Harness::build(
        MemoryChannel::new(),
        SyntheticDevice::new(),
        RecordingNotifier::default(),
        RecordingPoster {
            fail: true,
            ..RecordingPoster::default()
        },
    );

    harness
        .controller
        .post_comment("hello".to_string())
        .await
        .unwrap();

    assert_eq!(harness.poster.messages.lock().as_slice(), &["hello".to_string()]);
    let errors = errors(&harness.drain_events());
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, ErrorKind::Request);
}
