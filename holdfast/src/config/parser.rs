//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.

use ini::{Ini, Properties};
use std::path::PathBuf;
use std::str::FromStr;

use super::file::ConfigFileError;
use super::settings::*;
use crate::cache::CacheStrategy;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [client] section
    if let Some(section) = ini.section(Some("client")) {
        if let Some(v) = section.get("timeout_secs") {
            config.client.timeout_secs = parse_positive(v, "client", "timeout_secs")?;
        }
    }

    // [headers] section: every key is a header name
    if let Some(section) = ini.section(Some("headers")) {
        for (name, value) in section.iter() {
            config.headers.insert(name, value.trim());
        }
    }

    // [retry] section
    if let Some(section) = ini.section(Some("retry")) {
        if let Some(v) = section.get("policy") {
            config.retry.policy = RetryKind::from_str(v).map_err(|_| {
                invalid("retry", "policy", v, "must be one of: none, fixed, exponential")
            })?;
        }
        if let Some(v) = section.get("max_attempts") {
            config.retry.max_attempts = parse_number(v, "retry", "max_attempts")?;
        }
        if let Some(v) = section.get("delay_ms") {
            config.retry.delay_ms = parse_number(v, "retry", "delay_ms")?;
        }
        if let Some(v) = section.get("multiplier") {
            let multiplier: f64 = v.trim().parse().map_err(|_| {
                invalid("retry", "multiplier", v, "must be a number of at least 1.0")
            })?;
            if !multiplier.is_finite() || multiplier < 1.0 {
                return Err(invalid(
                    "retry",
                    "multiplier",
                    v,
                    "must be a number of at least 1.0",
                ));
            }
            config.retry.multiplier = multiplier;
        }
        if let Some(v) = optional(section, "max_delay_ms") {
            config.retry.max_delay_ms = Some(parse_number(v, "retry", "max_delay_ms")?);
        }
        if let Some(v) = section.get("jitter") {
            config.retry.jitter = parse_bool(v);
        }
        if let Some(v) = section.get("retryable_statuses") {
            config.retry.retryable_statuses = parse_statuses(v)?;
        }
    }

    // [cache] section
    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = section.get("strategy") {
            config.cache.strategy = CacheStrategy::parse(v).ok_or_else(|| {
                invalid(
                    "cache",
                    "strategy",
                    v,
                    "must be one of: none, network_first, cache_first, cache_only, network_only",
                )
            })?;
        }
        if let Some(v) = section.get("ttl_secs") {
            config.cache.ttl_secs = match v.trim() {
                "" | "0" => None,
                other => Some(parse_number(other, "cache", "ttl_secs")?),
            };
        }
        if let Some(v) = section.get("storage") {
            config.cache.storage = parse_storage(v, "cache")?;
        }
        if let Some(v) = section.get("capacity") {
            config.cache.capacity = parse_positive(v, "cache", "capacity")?;
        }
        if let Some(v) = optional(section, "directory") {
            config.cache.directory = expand_tilde(v);
        }
        if let Some(v) = section.get("sweep_interval_secs") {
            config.cache.sweep_interval_secs = parse_positive(v, "cache", "sweep_interval_secs")?;
        }
    }

    // [queue] section
    if let Some(section) = ini.section(Some("queue")) {
        if let Some(v) = section.get("storage") {
            config.queue.storage = parse_storage(v, "queue")?;
        }
        if let Some(v) = section.get("max_size") {
            config.queue.max_size = parse_positive(v, "queue", "max_size")?;
        }
        if let Some(v) = section.get("max_age_secs") {
            config.queue.max_age_secs = parse_positive(v, "queue", "max_age_secs")?;
        }
        if let Some(v) = section.get("max_replay_attempts") {
            config.queue.max_replay_attempts = parse_positive(v, "queue", "max_replay_attempts")?;
        }
        if let Some(v) = optional(section, "directory") {
            config.queue.directory = expand_tilde(v);
        }
        if let Some(v) = section.get("sweep_interval_secs") {
            config.queue.sweep_interval_secs = parse_positive(v, "queue", "sweep_interval_secs")?;
        }
        if let Some(v) = section.get("auto_replay") {
            config.queue.auto_replay = parse_bool(v);
        }
    }

    // [connectivity] section
    if let Some(section) = ini.section(Some("connectivity")) {
        if let Some(v) = section.get("enabled") {
            config.connectivity.enabled = parse_bool(v);
        }
        if let Some(v) = section.get("probe") {
            config.connectivity.probe = ProbeKind::from_str(v)
                .map_err(|_| invalid("connectivity", "probe", v, "must be 'tcp' or 'http'"))?;
        }
        if let Some(v) = section.get("endpoints") {
            config.connectivity.endpoints = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = section.get("interval_secs") {
            config.connectivity.interval_secs = parse_positive(v, "connectivity", "interval_secs")?;
        }
        if let Some(v) = section.get("probe_timeout_secs") {
            config.connectivity.probe_timeout_secs =
                parse_positive(v, "connectivity", "probe_timeout_secs")?;
        }
        if let Some(v) = section.get("excellent_latency_ms") {
            config.connectivity.excellent_latency_ms =
                parse_number(v, "connectivity", "excellent_latency_ms")?;
        }
        if let Some(v) = section.get("good_latency_ms") {
            config.connectivity.good_latency_ms =
                parse_number(v, "connectivity", "good_latency_ms")?;
        }
        if config.connectivity.good_latency_ms < config.connectivity.excellent_latency_ms {
            return Err(invalid(
                "connectivity",
                "good_latency_ms",
                &config.connectivity.good_latency_ms.to_string(),
                "must not be below excellent_latency_ms",
            ));
        }
    }

    // [dedup] section
    if let Some(section) = ini.section(Some("dedup")) {
        if let Some(v) = section.get("enabled") {
            config.dedup.enabled = parse_bool(v);
        }
        if let Some(v) = section.get("window_ms") {
            config.dedup.window_ms = parse_positive(v, "dedup", "window_ms")?;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = optional(section, "directory") {
            config.logging.directory = expand_tilde(v);
        }
        if let Some(v) = optional(section, "file") {
            config.logging.file = v.to_string();
        }
        if let Some(v) = section.get("log_events") {
            config.logging.log_events = parse_bool(v);
        }
    }

    Ok(config)
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Returns the trimmed value, or `None` when the key is absent or empty.
fn optional<'a>(section: &'a Properties, key: &str) -> Option<&'a str> {
    section.get(key).map(str::trim).filter(|v| !v.is_empty())
}

fn parse_number<T: FromStr>(value: &str, section: &str, key: &str) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, "must be a non-negative integer"))
}

fn parse_positive<T>(value: &str, section: &str, key: &str) -> Result<T, ConfigFileError>
where
    T: FromStr + Default + PartialEq,
{
    match value.trim().parse::<T>() {
        Ok(parsed) if parsed != T::default() => Ok(parsed),
        _ => Err(invalid(section, key, value, "must be a positive integer")),
    }
}

fn parse_storage(value: &str, section: &str) -> Result<StorageKind, ConfigFileError> {
    StorageKind::from_str(value).map_err(|_| {
        invalid(
            section,
            "storage",
            value,
            "must be one of: memory, persistent, disabled",
        )
    })
}

fn parse_statuses(value: &str) -> Result<Vec<u16>, ConfigFileError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| match s.parse::<u16>() {
            Ok(status) if (100..600).contains(&status) => Ok(status),
            _ => Err(invalid(
                "retry",
                "retryable_statuses",
                value,
                "must be a comma-separated list of HTTP status codes",
            )),
        })
        .collect()
}

/// Parse a boolean value from config string.
/// Accepts: true/false, yes/no, 1/0, on/off (case-insensitive).
pub(super) fn parse_bool(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v == "true" || v == "1" || v == "yes" || v == "on"
}

/// Expand ~ to home directory in paths.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::defaults::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn load(contents: &str) -> Result<ConfigFile, ConfigFileError> {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");
        std::fs::write(&config_path, contents).unwrap();
        ConfigFile::load_from(&config_path)
    }

    #[test]
    fn test_partial_config() {
        let config = load(
            r#"
[client]
timeout_secs = 10

[queue]
storage = persistent
auto_replay = yes
"#,
        )
        .unwrap();

        // Specified values
        assert_eq!(config.client.timeout_secs, 10);
        assert_eq!(config.queue.storage, StorageKind::Persistent);
        assert!(config.queue.auto_replay);

        // Default values
        assert_eq!(config.queue.max_size, DEFAULT_QUEUE_MAX_SIZE);
        assert_eq!(config.retry.policy, RetryKind::Exponential);
        assert!(config.dedup.enabled);
    }

    #[test]
    fn test_headers_section_becomes_default_headers() {
        let config = load(
            r#"
[headers]
User-Agent = holdfast/1.0
X-Api-Key = secret
"#,
        )
        .unwrap();

        assert_eq!(config.headers.get("user-agent"), Some("holdfast/1.0"));
        assert_eq!(config.headers.get("x-api-key"), Some("secret"));
    }

    #[test]
    fn test_retry_section() {
        let config = load(
            r#"
[retry]
policy = fixed
max_attempts = 5
delay_ms = 250
jitter = on
retryable_statuses = 503, 429
"#,
        )
        .unwrap();

        assert_eq!(config.retry.policy, RetryKind::Fixed);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.delay_ms, 250);
        assert!(config.retry.jitter);
        assert_eq!(config.retry.retryable_statuses, vec![503, 429]);
    }

    #[test]
    fn test_invalid_retry_policy() {
        let err = load("[retry]\npolicy = sometimes\n").unwrap_err();
        match err {
            ConfigFileError::InvalidValue {
                section, key, value, ..
            } => {
                assert_eq!(section, "retry");
                assert_eq!(key, "policy");
                assert_eq!(value, "sometimes");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_zero_queue_size_rejected() {
        assert!(matches!(
            load("[queue]\nmax_size = 0\n"),
            Err(ConfigFileError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_multiplier_below_one_rejected() {
        assert!(load("[retry]\nmultiplier = 0.5\n").is_err());
    }

    #[test]
    fn test_bad_status_list_rejected() {
        assert!(load("[retry]\nretryable_statuses = 503, teapot\n").is_err());
        assert!(load("[retry]\nretryable_statuses = 999\n").is_err());
    }

    #[test]
    fn test_cache_ttl_zero_means_no_expiry() {
        let config = load("[cache]\nstrategy = cache-first\nttl_secs = 0\n").unwrap();
        assert_eq!(config.cache.strategy, CacheStrategy::CacheFirst);
        assert_eq!(config.cache.ttl_secs, None);
    }

    #[test]
    fn test_connectivity_endpoints_list() {
        let config = load(
            r#"
[connectivity]
probe = http
endpoints = https://a.example/health, https://b.example/health,
interval_secs = 10
"#,
        )
        .unwrap();

        assert_eq!(config.connectivity.probe, ProbeKind::Http);
        assert_eq!(
            config.connectivity.endpoints,
            vec!["https://a.example/health", "https://b.example/health"]
        );
        assert_eq!(config.connectivity.interval_secs, 10);
    }

    #[test]
    fn test_latency_thresholds_must_be_ordered() {
        assert!(load("[connectivity]\nexcellent_latency_ms = 400\ngood_latency_ms = 200\n").is_err());
    }

    #[test]
    fn test_directories_expand_tilde() {
        let config = load("[queue]\ndirectory = /var/lib/holdfast/queue\n").unwrap();
        assert_eq!(config.queue.directory, Path::new("/var/lib/holdfast/queue"));
    }

    #[test]
    fn test_parse_bool_values() {
        for v in ["true", "TRUE", "yes", "1", "on", "  On "] {
            assert!(parse_bool(v), "{v} should be true");
        }
        for v in ["false", "no", "0", "off", "maybe", ""] {
            assert!(!parse_bool(v), "{v} should be false");
        }
    }
}
