//! Termination Notifier: tells the composition service a session ended.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use url::Url;

use crate::error::ApiError;
use crate::{endpoint, ApiResult, FALLBACK_ERROR_MESSAGE};

/// Body of `POST /end_stream`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminationRequest {
    /// Presenter id.
    pub streamer_id: String,

    /// Session id.
    pub session_id: String,
}

/// Sends the one-shot end-of-session notice.
#[async_trait]
pub trait TerminationNotifier: Send + Sync {
    /// Notify the backend once. No retry.
    async fn notify_end(&self, request: &TerminationRequest) -> ApiResult<()>;
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// [`TerminationNotifier`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTerminationNotifier {
    client: Client,
    url: Url,
}

impl HttpTerminationNotifier {
    /// Create a notifier for the composition service at `base`.
    pub fn new(client: Client, base: &str) -> ApiResult<Self> {
        Ok(Self {
            client,
            url: endpoint(base, "end_stream")?,
        })
    }
}

#[async_trait]
impl TerminationNotifier for HttpTerminationNotifier {
    #[instrument(name = "notify_end", skip_all, fields(session_id = %request.session_id))]
    async fn notify_end(&self, request: &TerminationRequest) -> ApiResult<()> {
        let response = match self.client.post(self.url.clone()).json(request).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("End-of-session request failed: {}", e);
                return Err(ApiError::Transport(e));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|body| body.message)
                .unwrap_or_else(|| FALLBACK_ERROR_MESSAGE.to_string());

            warn!(status = status.as_u16(), %message, "Composition service refused end of session");
            return Err(ApiError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        info!("Composition service notified");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> TerminationRequest {
        TerminationRequest {
            streamer_id: "alice".to_string(),
            session_id: "42".to_string(),
        }
    }

    #[tokio::test]
    async fn test_notify_posts_identity_as_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/end_stream"))
            .and(header("content-type", "application/json"))
            .and(body_json(json!({"streamer_id": "alice", "session_id": "42"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ended"})))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = HttpTerminationNotifier::new(Client::new(), &server.uri()).unwrap();
        notifier.notify_end(&request()).await.unwrap();
    }

    #[tokio::test]
    async fn test_rejection_surfaces_server_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/end_stream"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"message": "session not found"})),
            )
            .mount(&server)
            .await;

        let notifier = HttpTerminationNotifier::new(Client::new(), &server.uri()).unwrap();
        let err = notifier.notify_end(&request()).await.unwrap_err();

        assert!(matches!(err, ApiError::Rejected { status: 404, .. }));
        assert_eq!(err.to_string(), "session not found");
    }

    #[tokio::test]
    async fn test_rejection_without_message_uses_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/end_stream"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .mount(&server)
            .await;

        let notifier = HttpTerminationNotifier::new(Client::new(), &server.uri()).unwrap();
        let err = notifier.notify_end(&request()).await.unwrap_err();

        assert_eq!(err.to_string(), FALLBACK_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn test_unreachable_service_is_a_transport_error() {
        let notifier = HttpTerminationNotifier::new(Client::new(), "http://127.0.0.1:1").unwrap();
        let err = notifier.notify_end(&request()).await.unwrap_err();

        assert!(matches!(err, ApiError::Transport(_)));
    }
}
