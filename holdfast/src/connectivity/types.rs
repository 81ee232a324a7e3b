use chrono::{DateTime, Utc};
use std::time::Duration;

/// Reachability of the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectivityStatus {
    Connected,
    Disconnected,
    /// No probe has completed, or no endpoints are configured.
    #[default]
    Unknown,
}

/// Latency tier of the fastest successful probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum ConnectionQuality {
    #[default]
    None,
    Poor,
    Good,
    Excellent,
}

/// Latest connectivity snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectivityInfo {
    pub status: ConnectivityStatus,
    pub quality: ConnectionQuality,
    pub checked_at: DateTime<Utc>,
    /// Endpoint whose probe determined the status.
    pub endpoint: Option<String>,
    pub latency: Option<Duration>,
    /// True while the manual offline override is active.
    pub manual: bool,
}

impl ConnectivityInfo {
    pub fn unknown() -> Self {
        Self {
            status: ConnectivityStatus::Unknown,
            quality: ConnectionQuality::None,
            checked_at: Utc::now(),
            endpoint: None,
            latency: None,
            manual: false,
        }
    }

    pub fn manual_offline() -> Self {
        Self {
            status: ConnectivityStatus::Disconnected,
            manual: true,
            ..Self::unknown()
        }
    }

    /// Only a definite disconnect counts as offline.
    pub fn is_offline(&self) -> bool {
        self.status == ConnectivityStatus::Disconnected
    }

    pub(crate) fn same_state(&self, other: &ConnectivityInfo) -> bool {
        self.status == other.status && self.quality == other.quality
    }
}

impl Default for ConnectivityInfo {
    fn default() -> Self {
        Self::unknown()
    }
}
