//! Orchestrator defaults and per-request overrides.

use crate::cache::CachePolicy;
use crate::request::Headers;
use crate::retry::RetryPolicy;
use std::time::Duration;

/// Default per-attempt timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default age after which an in-flight dedup marker is considered stale.
pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_secs(30);

/// Defaults applied to every request.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Per-attempt timeout when the request does not set one.
    pub default_timeout: Duration,
    /// Merged into every request; headers set on the request win.
    pub default_headers: Headers,
    pub retry: RetryPolicy,
    pub cache: CachePolicy,
    pub dedup_enabled: bool,
    pub dedup_window: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_TIMEOUT,
            default_headers: Headers::new(),
            retry: RetryPolicy::default(),
            cache: CachePolicy::default(),
            dedup_enabled: true,
            dedup_window: DEFAULT_DEDUP_WINDOW,
        }
    }
}

/// Per-request overrides. Unset fields fall back to [`OrchestratorConfig`].
///
/// ```
/// use holdfast::orchestrator::RequestOptions;
/// use holdfast::retry::RetryPolicy;
/// use std::time::Duration;
///
/// let options = RequestOptions::new()
///     .timeout(Duration::from_secs(2))
///     .retry(RetryPolicy::None)
///     .dedup(false);
/// ```
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub timeout: Option<Duration>,
    pub retry: Option<RetryPolicy>,
    pub cache: Option<CachePolicy>,
    pub dedup: Option<bool>,
    pub dedup_window: Option<Duration>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn cache(mut self, cache: CachePolicy) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn dedup(mut self, enabled: bool) -> Self {
        self.dedup = Some(enabled);
        self
    }

    pub fn dedup_window(mut self, window: Duration) -> Self {
        self.dedup_window = Some(window);
        self
    }
}

/// Settings in force for one execution.
#[derive(Debug, Clone)]
pub(crate) struct Effective {
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub cache: CachePolicy,
    pub dedup: bool,
    pub dedup_window: Duration,
}

impl Effective {
    pub fn resolve(config: &OrchestratorConfig, options: RequestOptions) -> Self {
        Self {
            timeout: options.timeout.unwrap_or(config.default_timeout),
            retry: options.retry.unwrap_or_else(|| config.retry.clone()),
            cache: options.cache.unwrap_or_else(|| config.cache.clone()),
            dedup: options.dedup.unwrap_or(config.dedup_enabled),
            dedup_window: options.dedup_window.unwrap_or(config.dedup_window),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStrategy;

    #[test]
    fn test_options_override_config() {
        let config = OrchestratorConfig::default();
        let effective = Effective::resolve(
            &config,
            RequestOptions::new()
                .timeout(Duration::from_secs(1))
                .cache(CachePolicy::new(CacheStrategy::CacheOnly))
                .dedup(false),
        );

        assert_eq!(effective.timeout, Duration::from_secs(1));
        assert_eq!(effective.cache.strategy, CacheStrategy::CacheOnly);
        assert!(!effective.dedup);
        assert_eq!(effective.dedup_window, DEFAULT_DEDUP_WINDOW);
        assert_eq!(effective.retry.max_attempts(), config.retry.max_attempts());
    }
}
