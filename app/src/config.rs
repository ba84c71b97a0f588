//! Configuration from the environment and the session link.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use url::Url;

use presenter_ipc::{SessionConfig, SessionIdentity};

/// Ingestion channel address, including the namespace path.
pub const STREAMING_SERVICE_VAR: &str = "PRESENTER_STREAMING_SERVICE";

/// Comment service base URL.
pub const COMMENT_SERVICE_VAR: &str = "PRESENTER_COMMENT_SERVICE";

/// Composition service base URL.
pub const COMPOSITION_API_VAR: &str = "PRESENTER_COMPOSITION_API";

/// Chunk timer period in milliseconds.
pub const TIMESLICE_VAR: &str = "PRESENTER_TIMESLICE_MS";

/// External capture command line; the synthetic device is used when unset.
pub const CAPTURE_COMMAND_VAR: &str = "PRESENTER_CAPTURE_COMMAND";

/// Container/codec the capture command produces.
pub const CAPTURE_MIME_VAR: &str = "PRESENTER_CAPTURE_MIME";

/// Path of the stored credential file.
pub const CREDENTIALS_VAR: &str = "PRESENTER_CREDENTIALS";

/// Everything the shell needs to build an engine.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Session configuration handed to the engine.
    pub session: SessionConfig,

    /// External capture command line, if any.
    pub capture_command: Option<String>,

    /// Credential file, if any.
    pub credentials_path: Option<PathBuf>,
}

impl AppConfig {
    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`. Unset or empty values keep the
    /// defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut session = SessionConfig::default();

        if let Some(value) = get(STREAMING_SERVICE_VAR) {
            session.streaming_service = value;
        }
        if let Some(value) = get(COMMENT_SERVICE_VAR) {
            session.comment_service = value;
        }
        if let Some(value) = get(COMPOSITION_API_VAR) {
            session.composition_service = value;
        }
        if let Some(value) = get(TIMESLICE_VAR) {
            let timeslice_ms: u64 = value
                .trim()
                .parse()
                .with_context(|| format!("{TIMESLICE_VAR} must be a number of milliseconds"))?;
            if timeslice_ms == 0 {
                bail!("{TIMESLICE_VAR} must be greater than zero");
            }
            session.capture.timeslice_ms = timeslice_ms;
        }
        if let Some(value) = get(CAPTURE_MIME_VAR) {
            session.capture.mime_type = value;
        }

        Ok(Self {
            session,
            capture_command: get(CAPTURE_COMMAND_VAR),
            credentials_path: get(CREDENTIALS_VAR).map(PathBuf::from),
        })
    }
}

/// Extract the presenter (`s`) and session (`v`) ids from a session link.
pub fn parse_session_link(link: &str) -> Result<SessionIdentity> {
    let url = Url::parse(link).with_context(|| format!("Invalid session link: {link}"))?;

    let param = |name: &str| {
        url.query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| anyhow!("Session link is missing the '{name}' parameter"))
    };

    Ok(SessionIdentity::new(param("s")?, param("v")?))
}
