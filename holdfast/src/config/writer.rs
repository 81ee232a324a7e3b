//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! This module contains the `to_config_string()` function that produces
//! the commented INI representation written to `config.ini`.

use std::fmt::Write as _;
use std::path::Path;

use super::settings::ConfigFile;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let max_delay_ms = config
        .retry
        .max_delay_ms
        .map(|v| v.to_string())
        .unwrap_or_default();
    let retryable_statuses = config
        .retry
        .retryable_statuses
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let ttl_secs = config.cache.ttl_secs.unwrap_or(0);

    let mut out = format!(
        r#"[client]
; Timeout in seconds for each network attempt (default: 30)
timeout_secs = {}

[retry]
; Retry policy for failed attempts:
;   none        - never retry
;   fixed       - constant delay between retries
;   exponential - delay_ms * multiplier^attempt (default)
policy = {}
; Retries after the first attempt (default: 3)
max_attempts = {}
; Fixed delay, or initial exponential delay, in milliseconds (default: 500)
delay_ms = {}
; Backoff multiplier for exponential retries (default: 2.0)
multiplier = {}
; Cap on exponential delays in milliseconds. Empty means no cap.
max_delay_ms = {}
; Randomise each delay between 50% and 100% of its value (default: false)
jitter = {}
; Status codes worth retrying (default: 408, 429, 500, 502, 503, 504)
retryable_statuses = {}

[cache]
; Cache strategy:
;   network_first - network, falling back to a fresh cached copy (default)
;   cache_first   - cached copy if fresh, otherwise network
;   cache_only    - cached copy if fresh, never writes
;   network_only  - never read or write
;   none          - cache disabled
strategy = {}
; Entry lifetime in seconds. 0 keeps entries until evicted. (default: 300)
ttl_secs = {}
; Where entries live: memory, persistent, or disabled (default: memory)
storage = {}
; Maximum number of entries (default: 256)
capacity = {}
; Directory for persistent entries
directory = {}
; Seconds between expired-entry sweeps (default: 60)
sweep_interval_secs = {}

[queue]
; Offline queue storage: memory, persistent, or disabled (default: memory)
; When disabled, mutating requests fail while offline.
storage = {}
; Maximum queued requests; the oldest is evicted when full (default: 100)
max_size = {}
; Queued requests older than this many seconds are dropped (default: 86400)
max_age_secs = {}
; Replay attempts before a queued request is dropped (default: 5)
max_replay_attempts = {}
; Directory for the persistent queue
directory = {}
; Seconds between age sweeps (default: 300)
sweep_interval_secs = {}
; Replay queued requests automatically when connectivity returns (default: false)
auto_replay = {}

[connectivity]
; Probe the network and go offline when every endpoint fails (default: true)
enabled = {}
; Probe type: tcp (host:port endpoints) or http (URL endpoints)
probe = {}
; Comma-separated endpoints
endpoints = {}
; Seconds between probe cycles (default: 30)
interval_secs = {}
; Seconds before a single probe gives up (default: 5)
probe_timeout_secs = {}
; Latency thresholds in milliseconds for excellent and good quality
excellent_latency_ms = {}
good_latency_ms = {}

[dedup]
; Share one network call between identical concurrent requests (default: true)
enabled = {}
; In-flight markers older than this many milliseconds are ignored (default: 30000)
window_ms = {}

[logging]
; Directory for log files
directory = {}
; Log file name (default: holdfast.log)
file = {}
; Mirror cache, queue and connectivity events into the log (default: true)
log_events = {}
"#,
        config.client.timeout_secs,
        config.retry.policy,
        config.retry.max_attempts,
        config.retry.delay_ms,
        config.retry.multiplier,
        max_delay_ms,
        config.retry.jitter,
        retryable_statuses,
        config.cache.strategy.as_str(),
        ttl_secs,
        config.cache.storage,
        config.cache.capacity,
        path_to_string(&config.cache.directory),
        config.cache.sweep_interval_secs,
        config.queue.storage,
        config.queue.max_size,
        config.queue.max_age_secs,
        config.queue.max_replay_attempts,
        path_to_string(&config.queue.directory),
        config.queue.sweep_interval_secs,
        config.queue.auto_replay,
        config.connectivity.enabled,
        config.connectivity.probe.as_str(),
        config.connectivity.endpoints.join(", "),
        config.connectivity.interval_secs,
        config.connectivity.probe_timeout_secs,
        config.connectivity.excellent_latency_ms,
        config.connectivity.good_latency_ms,
        config.dedup.enabled,
        config.dedup.window_ms,
        path_to_string(&config.logging.directory),
        config.logging.file,
        config.logging.log_events,
    );

    out.push_str("\n[headers]\n; Default headers sent with every request, one per line\n");
    for (name, value) in config.headers.iter() {
        let _ = writeln!(out, "{} = {}", name, value);
    }

    out
}

/// Convert path to string, collapsing home dir to ~.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::super::settings::*;
    use crate::cache::CacheStrategy;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");

        let mut config = ConfigFile::default();
        config.client.timeout_secs = 12;
        config.headers.insert("User-Agent", "holdfast-test");
        config.retry.policy = RetryKind::Fixed;
        config.retry.max_delay_ms = Some(8_000);
        config.retry.retryable_statuses = vec![503];
        config.cache.strategy = CacheStrategy::CacheFirst;
        config.cache.ttl_secs = None;
        config.queue.storage = StorageKind::Persistent;
        config.queue.directory = PathBuf::from("/tmp/holdfast-queue");
        config.queue.auto_replay = true;
        config.connectivity.endpoints = vec!["example.com:443".to_string()];
        config.dedup.window_ms = 1_500;

        config.save_to(&config_path).unwrap();
        let loaded = ConfigFile::load_from(&config_path).unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_default_round_trips() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.ini");

        ConfigFile::default().save_to(&config_path).unwrap();

        assert_eq!(ConfigFile::load_from(&config_path).unwrap(), ConfigFile::default());
    }
}
