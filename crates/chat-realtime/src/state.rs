//! Connection lifecycle state

use serde::{Deserialize, Serialize};

/// Lifecycle state of a connection manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No transport handle; initial state and the state after `close()`
    #[default]
    Idle,
    /// A transport handle exists and is waiting to open
    Connecting,
    /// The transport is open and frames can be sent
    Open,
    /// The last handle failed; a retry timer is pending
    ClosedPendingRetry,
    /// Retry attempts exhausted; only `force_reconnect` leaves this state
    GivenUp,
}

impl ConnectionState {
    /// Whether frames can be sent
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Open)
    }

    /// Whether a connection attempt is in flight or scheduled
    #[must_use]
    pub const fn is_connecting(self) -> bool {
        matches!(self, Self::Connecting | Self::ClosedPendingRetry)
    }

    /// Whether the manager will do nothing further on its own
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Idle | Self::GivenUp)
    }

    /// Get the name of this state
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::ClosedPendingRetry => "closed_pending_retry",
            Self::GivenUp => "given_up",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
