//! Conversion from file settings into runtime configuration.

use std::collections::HashSet;
use std::time::Duration;

use super::settings::*;
use crate::cache::CachePolicy;
use crate::connectivity::MonitorConfig;
use crate::orchestrator::OrchestratorConfig;
use crate::queue::QueueConfig;
use crate::retry::{RetryPolicy, RetryableSet, DEFAULT_RETRYABLE_KINDS};

impl RetrySettings {
    pub fn to_policy(&self) -> RetryPolicy {
        let retryable = RetryableSet {
            statuses: self.retryable_statuses.iter().copied().collect::<HashSet<_>>(),
            kinds: DEFAULT_RETRYABLE_KINDS.into_iter().collect(),
        };
        let delay = Duration::from_millis(self.delay_ms);

        match self.policy {
            RetryKind::None => RetryPolicy::None,
            RetryKind::Fixed => {
                RetryPolicy::fixed(delay, self.max_attempts).with_retryable(retryable)
            }
            RetryKind::Exponential => {
                let mut policy = RetryPolicy::exponential(delay, self.multiplier, self.max_attempts)
                    .with_retryable(retryable);
                if let Some(cap) = self.max_delay_ms {
                    policy = policy.with_max_delay(Duration::from_millis(cap));
                }
                if self.jitter {
                    policy = policy.with_jitter();
                }
                policy
            }
        }
    }
}

impl CacheSettings {
    pub fn to_policy(&self) -> CachePolicy {
        let policy = CachePolicy::new(self.strategy);
        match self.ttl_secs {
            Some(secs) => policy.with_ttl(Duration::from_secs(secs)),
            None => policy,
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl QueueSettings {
    pub fn to_queue_config(&self) -> QueueConfig {
        QueueConfig {
            max_size: self.max_size,
            max_age: Duration::from_secs(self.max_age_secs),
            max_replay_attempts: self.max_replay_attempts,
            ..QueueConfig::default()
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl ConnectivitySettings {
    pub fn to_monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            endpoints: self.endpoints.clone(),
            interval: Duration::from_secs(self.interval_secs),
            probe_timeout: Duration::from_secs(self.probe_timeout_secs),
            excellent_latency: Duration::from_millis(self.excellent_latency_ms),
            good_latency: Duration::from_millis(self.good_latency_ms),
        }
    }
}

impl ConfigFile {
    /// Builds the orchestrator defaults described by this file.
    pub fn to_orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            default_timeout: Duration::from_secs(self.client.timeout_secs),
            default_headers: self.headers.clone(),
            retry: self.retry.to_policy(),
            cache: self.cache.to_policy(),
            dedup_enabled: self.dedup.enabled,
            dedup_window: Duration::from_millis(self.dedup.window_ms),
        }
    }
}
