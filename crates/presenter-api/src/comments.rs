//! Outbound comment upload.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;
use tracing::{debug, instrument};
use url::Url;

use crate::error::ApiError;
use crate::{endpoint, ApiResult};

/// Submits a comment through the comment service's upload endpoint.
#[async_trait]
pub trait CommentPoster: Send + Sync {
    /// Upload `message`. Anything but 200 is a failure.
    async fn post_comment(&self, message: &str) -> ApiResult<()>;
}

/// [`CommentPoster`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpCommentPoster {
    client: Client,
    url: Url,
}

impl HttpCommentPoster {
    /// Create a poster for the comment service at `base`.
    pub fn new(client: Client, base: &str) -> ApiResult<Self> {
        Ok(Self {
            client,
            url: endpoint(base, "comments/upload")?,
        })
    }
}

#[async_trait]
impl CommentPoster for HttpCommentPoster {
    #[instrument(name = "post_comment", skip_all)]
    async fn post_comment(&self, message: &str) -> ApiResult<()> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&json!({ "message": message }))
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ApiError::Status {
                status: status.as_u16(),
            });
        }

        debug!("Comment uploaded");
        Ok(())
    }
}
