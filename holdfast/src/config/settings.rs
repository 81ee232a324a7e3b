//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types; parsing lives in [`super::parser`] and
//! conversion into runtime types in [`super::convert`].

use crate::cache::CacheStrategy;
use crate::request::Headers;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Complete configuration loaded from config.ini.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub client: ClientSettings,
    /// Default headers applied to every request
    pub headers: Headers,
    pub retry: RetrySettings,
    pub cache: CacheSettings,
    pub queue: QueueSettings,
    pub connectivity: ConnectivitySettings,
    pub dedup: DedupSettings,
    pub logging: LoggingSettings,
}

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    /// Per-attempt timeout in seconds.
    pub timeout_secs: u64,
}

/// Retry strategy names accepted in `[retry] policy`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryKind {
    None,
    Fixed,
    Exponential,
}

impl RetryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RetryKind::None => "none",
            RetryKind::Fixed => "fixed",
            RetryKind::Exponential => "exponential",
        }
    }
}

impl FromStr for RetryKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(RetryKind::None),
            "fixed" => Ok(RetryKind::Fixed),
            "exponential" => Ok(RetryKind::Exponential),
            _ => Err(()),
        }
    }
}

impl fmt::Display for RetryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retry configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrySettings {
    pub policy: RetryKind,
    /// Maximum number of retries after the first attempt.
    pub max_attempts: u32,
    /// Fixed delay, or the initial delay for exponential backoff.
    pub delay_ms: u64,
    pub multiplier: f64,
    /// Upper bound on exponential delays. `None` means uncapped.
    pub max_delay_ms: Option<u64>,
    pub jitter: bool,
    pub retryable_statuses: Vec<u16>,
}

/// Where a store keeps its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Memory,
    Persistent,
    Disabled,
}

impl StorageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageKind::Memory => "memory",
            StorageKind::Persistent => "persistent",
            StorageKind::Disabled => "disabled",
        }
    }
}

impl FromStr for StorageKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(StorageKind::Memory),
            "persistent" | "file" => Ok(StorageKind::Persistent),
            "disabled" | "none" => Ok(StorageKind::Disabled),
            _ => Err(()),
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    pub strategy: CacheStrategy,
    /// Entry lifetime in seconds. `None` keeps entries until evicted.
    pub ttl_secs: Option<u64>,
    /// `memory` or `persistent`; `disabled` uses a no-op store.
    pub storage: StorageKind,
    pub capacity: usize,
    /// Directory for the persistent store.
    pub directory: PathBuf,
    pub sweep_interval_secs: u64,
}

/// Offline queue configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSettings {
    pub storage: StorageKind,
    pub max_size: usize,
    pub max_age_secs: u64,
    pub max_replay_attempts: u32,
    /// Directory for the persistent queue.
    pub directory: PathBuf,
    pub sweep_interval_secs: u64,
    /// Replay automatically when connectivity returns.
    pub auto_replay: bool,
}

/// Probe implementation used by the connectivity monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    Tcp,
    Http,
}

impl ProbeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeKind::Tcp => "tcp",
            ProbeKind::Http => "http",
        }
    }
}

impl FromStr for ProbeKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tcp" => Ok(ProbeKind::Tcp),
            "http" => Ok(ProbeKind::Http),
            _ => Err(()),
        }
    }
}

/// Connectivity monitor configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectivitySettings {
    /// Whether a monitor runs at all. Without one the client is always online.
    pub enabled: bool,
    pub probe: ProbeKind,
    /// `host:port` for TCP probes, URLs for HTTP probes.
    pub endpoints: Vec<String>,
    pub interval_secs: u64,
    pub probe_timeout_secs: u64,
    pub excellent_latency_ms: u64,
    pub good_latency_ms: u64,
}

/// Request deduplication configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupSettings {
    pub enabled: bool,
    pub window_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub directory: PathBuf,
    pub file: String,
    /// Mirror the event stream into the log.
    pub log_events: bool,
}
