//! Default values and constants for all configuration settings.
//!
//! Contains all `DEFAULT_*` constants and the `ConfigFile::default()`
//! implementation.

use std::path::PathBuf;

use super::settings::*;
use crate::cache::{CacheStrategy, DEFAULT_MEMORY_CACHE_CAPACITY};
use crate::request::Headers;
use crate::retry::DEFAULT_RETRYABLE_STATUSES;

// =============================================================================
// Client defaults
// =============================================================================

/// Default per-attempt timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Retry defaults
// =============================================================================

pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;

/// Initial backoff delay in milliseconds.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;

pub const DEFAULT_RETRY_MULTIPLIER: f64 = 2.0;

// =============================================================================
// Cache defaults
// =============================================================================

/// Default cache entry lifetime (5 minutes).
pub const DEFAULT_CACHE_TTL_SECS: u64 = 300;

pub const DEFAULT_CACHE_SWEEP_INTERVAL_SECS: u64 = 60;

// =============================================================================
// Queue defaults
// =============================================================================

pub const DEFAULT_QUEUE_MAX_SIZE: usize = 100;

/// Queued requests older than a day are dropped.
pub const DEFAULT_QUEUE_MAX_AGE_SECS: u64 = 24 * 60 * 60;

pub const DEFAULT_QUEUE_MAX_REPLAY_ATTEMPTS: u32 = 5;

pub const DEFAULT_QUEUE_SWEEP_INTERVAL_SECS: u64 = 300;

// =============================================================================
// Connectivity defaults
// =============================================================================

pub const DEFAULT_PROBE_INTERVAL_SECS: u64 = 30;

pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;

pub const DEFAULT_EXCELLENT_LATENCY_MS: u64 = 100;

pub const DEFAULT_GOOD_LATENCY_MS: u64 = 500;

/// Public resolvers reachable from most networks.
pub const DEFAULT_PROBE_ENDPOINTS: [&str; 2] = ["1.1.1.1:443", "8.8.8.8:443"];

// =============================================================================
// Dedup defaults
// =============================================================================

pub const DEFAULT_DEDUP_WINDOW_MS: u64 = 30_000;

// =============================================================================
// Logging defaults
// =============================================================================

pub const DEFAULT_LOG_FILE: &str = "holdfast.log";

// =============================================================================
// Paths
// =============================================================================

/// Get the path to the config directory (~/.holdfast).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".holdfast")
}

/// Get the path to the config file (~/.holdfast/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

impl Default for ConfigFile {
    fn default() -> Self {
        let base = config_directory();

        Self {
            client: ClientSettings {
                timeout_secs: DEFAULT_TIMEOUT_SECS,
            },
            headers: Headers::new(),
            retry: RetrySettings {
                policy: RetryKind::Exponential,
                max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
                delay_ms: DEFAULT_RETRY_DELAY_MS,
                multiplier: DEFAULT_RETRY_MULTIPLIER,
                max_delay_ms: None,
                jitter: false,
                retryable_statuses: DEFAULT_RETRYABLE_STATUSES.to_vec(),
            },
            cache: CacheSettings {
                strategy: CacheStrategy::NetworkFirst,
                ttl_secs: Some(DEFAULT_CACHE_TTL_SECS),
                storage: StorageKind::Memory,
                capacity: DEFAULT_MEMORY_CACHE_CAPACITY,
                directory: base.join("cache"),
                sweep_interval_secs: DEFAULT_CACHE_SWEEP_INTERVAL_SECS,
            },
            queue: QueueSettings {
                storage: StorageKind::Memory,
                max_size: DEFAULT_QUEUE_MAX_SIZE,
                max_age_secs: DEFAULT_QUEUE_MAX_AGE_SECS,
                max_replay_attempts: DEFAULT_QUEUE_MAX_REPLAY_ATTEMPTS,
                directory: base.join("queue"),
                sweep_interval_secs: DEFAULT_QUEUE_SWEEP_INTERVAL_SECS,
                auto_replay: false,
            },
            connectivity: ConnectivitySettings {
                enabled: true,
                probe: ProbeKind::Tcp,
                endpoints: DEFAULT_PROBE_ENDPOINTS.iter().map(|s| s.to_string()).collect(),
                interval_secs: DEFAULT_PROBE_INTERVAL_SECS,
                probe_timeout_secs: DEFAULT_PROBE_TIMEOUT_SECS,
                excellent_latency_ms: DEFAULT_EXCELLENT_LATENCY_MS,
                good_latency_ms: DEFAULT_GOOD_LATENCY_MS,
            },
            dedup: DedupSettings {
                enabled: true,
                window_ms: DEFAULT_DEDUP_WINDOW_MS,
            },
            logging: LoggingSettings {
                directory: base.join("logs"),
                file: DEFAULT_LOG_FILE.to_string(),
                log_events: true,
            },
        }
    }
}
