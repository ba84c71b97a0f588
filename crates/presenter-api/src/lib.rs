//! One-shot HTTP requests made by the presenter client.
//!
//! Outbound comments and the end-of-session notice are plain requests, not
//! channel traffic. Each sits behind a small trait so the session controller
//! can be driven without a network.

mod comments;
mod error;
mod notifier;

pub use comments::{CommentPoster, HttpCommentPoster};
pub use error::ApiError;
pub use notifier::{HttpTerminationNotifier, TerminationNotifier, TerminationRequest};

use url::Url;

/// Result type for API requests.
pub type ApiResult<T> = Result<T, ApiError>;

/// Error text used when a failed response carries no message.
pub const FALLBACK_ERROR_MESSAGE: &str = "Something went wrong!";

/// Join `base` and a fixed endpoint path, tolerating a trailing slash.
pub(crate) fn endpoint(base: &str, path: &str) -> ApiResult<Url> {
    let joined = format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'));
    Url::parse(&joined).map_err(|e| ApiError::InvalidUrl(format!("{joined}: {e}")))
}
