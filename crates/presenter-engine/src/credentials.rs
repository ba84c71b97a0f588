//! Read-only access to previously stored login credentials.

use std::fs;
use std::io;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Access/refresh token pair. Either may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Bearer token for the ingestion service.
    #[serde(default)]
    pub access_token: Option<String>,

    /// Token used by the backend to renew the access token.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl Credentials {
    /// Create a pair from optional tokens.
    pub fn new(access_token: Option<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token,
            refresh_token,
        }
    }
}

/// Source of stored credentials. Absence is not an error.
pub trait CredentialStore: Send + Sync {
    /// Stored access token, if any.
    fn access_token(&self) -> Option<String>;

    /// Stored refresh token, if any.
    fn refresh_token(&self) -> Option<String>;

    /// Both tokens at once.
    fn credentials(&self) -> Credentials {
        Credentials::new(self.access_token(), self.refresh_token())
    }
}

/// Credentials held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    credentials: Credentials,
}

impl StaticCredentials {
    /// Store the given tokens.
    pub fn new(credentials: Credentials) -> Self {
        Self { credentials }
    }

    /// A store with no tokens at all.
    pub fn empty() -> Self {
        Self::default()
    }
}

impl CredentialStore for StaticCredentials {
    fn access_token(&self) -> Option<String> {
        self.credentials.access_token.clone()
    }

    fn refresh_token(&self) -> Option<String> {
        self.credentials.refresh_token.clone()
    }

    fn credentials(&self) -> Credentials {
        self.credentials.clone()
    }
}

/// Credentials read from a JSON file with `access_token` and
/// `refresh_token` keys.
///
/// The file is re-read on every lookup so tokens written by the login flow
/// are picked up without a restart. A missing or unreadable file reads as
/// no credentials.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Read credentials from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn load(&self) -> Credentials {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No credential file");
                return Credentials::default();
            }
            Err(e) => {
                warn!(path = %self.path.display(), "Failed to read credentials: {}", e);
                return Credentials::default();
            }
        };

        serde_json::from_str(&text).unwrap_or_else(|e| {
            warn!(path = %self.path.display(), "Malformed credential file: {}", e);
            Credentials::default()
        })
    }
}

impl CredentialStore for FileCredentialStore {
    fn access_token(&self) -> Option<String> {
        self.load().access_token
    }

    fn refresh_token(&self) -> Option<String> {
        self.load().refresh_token
    }

    fn credentials(&self) -> Credentials {
        self.load()
    }
}
