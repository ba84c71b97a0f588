//! Connection state management.

use serde::{Deserialize, Serialize};

/// Connectivity of one event channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Not connected.
    #[default]
    Disconnected,

    /// Handshake in progress.
    Connecting,

    /// Connected; sends are delivered.
    Connected,
}

impl ConnectionState {
    /// Check if connected.
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}
