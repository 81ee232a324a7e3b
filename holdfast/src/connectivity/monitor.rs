//! Periodic connectivity probing.

use super::probe::Prober;
use super::types::{ConnectionQuality, ConnectivityInfo, ConnectivityStatus};
use crate::events::EventEmitter;
use chrono::Utc;
use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Shortest probe period the loop will run at; a zero interval is raised to this.
pub const MIN_PROBE_INTERVAL: Duration = Duration::from_millis(1);

/// Probe schedule and quality thresholds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    /// Endpoints probed each cycle. Empty means the status stays unknown.
    pub endpoints: Vec<String>,
    pub interval: Duration,
    pub probe_timeout: Duration,
    /// Latency below this is excellent.
    pub excellent_latency: Duration,
    /// Latency below this (and not excellent) is good; anything slower is poor.
    pub good_latency: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            endpoints: Vec::new(),
            interval: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(5),
            excellent_latency: Duration::from_millis(100),
            good_latency: Duration::from_millis(500),
        }
    }
}

impl MonitorConfig {
    /// Maps a probe latency onto a quality tier.
    pub fn classify(&self, latency: Duration) -> ConnectionQuality {
        if latency < self.excellent_latency {
            ConnectionQuality::Excellent
        } else if latency < self.good_latency {
            ConnectionQuality::Good
        } else {
            ConnectionQuality::Poor
        }
    }
}

/// Tracks network reachability.
///
/// The latest [`ConnectivityInfo`] is always readable through
/// [`current`](Self::current). Subscribers of [`subscribe`](Self::subscribe)
/// are woken only when the status or quality changes.
pub struct ConnectivityMonitor {
    config: MonitorConfig,
    prober: Arc<dyn Prober>,
    tx: watch::Sender<ConnectivityInfo>,
    manual_offline: AtomicBool,
    events: Option<EventEmitter>,
}

impl ConnectivityMonitor {
    pub fn new(config: MonitorConfig, prober: Arc<dyn Prober>) -> Self {
        let (tx, _rx) = watch::channel(ConnectivityInfo::unknown());
        Self {
            config,
            prober,
            tx,
            manual_offline: AtomicBool::new(false),
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventEmitter) -> Self {
        self.events = Some(events);
        self
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Latest snapshot.
    pub fn current(&self) -> ConnectivityInfo {
        self.tx.borrow().clone()
    }

    /// Receiver notified on status or quality changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectivityInfo> {
        self.tx.subscribe()
    }

    /// True only for a definite disconnect. Unknown counts as online.
    pub fn is_offline(&self) -> bool {
        self.tx.borrow().is_offline()
    }

    pub fn is_manual_offline(&self) -> bool {
        self.manual_offline.load(Ordering::SeqCst)
    }

    /// Forces the monitor offline, or releases the override.
    ///
    /// Releasing runs a probe cycle immediately.
    pub async fn set_manual_offline(&self, offline: bool) {
        let was = self.manual_offline.swap(offline, Ordering::SeqCst);
        if offline {
            if !was {
                info!("Manual offline override enabled");
            }
            self.publish(ConnectivityInfo::manual_offline());
        } else {
            if was {
                info!("Manual offline override released");
            }
            self.run_probe_cycle().await;
        }
    }

    /// Probes every endpoint concurrently and publishes the result.
    ///
    /// Does nothing while the manual override is active.
    pub async fn run_probe_cycle(&self) -> ConnectivityInfo {
        if self.is_manual_offline() {
            return self.current();
        }

        let info = if self.config.endpoints.is_empty() {
            ConnectivityInfo::unknown()
        } else {
            self.probe_all().await
        };

        // The override may have been set while probing
        if self.is_manual_offline() {
            return self.current();
        }
        self.publish(info.clone());
        info
    }

    async fn probe_all(&self) -> ConnectivityInfo {
        let timeout = self.config.probe_timeout;
        let probes = self.config.endpoints.iter().map(|endpoint| async move {
            let started = Instant::now();
            let result = self.prober.probe(endpoint, timeout).await;
            (endpoint, result, started.elapsed())
        });

        let mut fastest: Option<(&String, Duration)> = None;
        for (endpoint, result, latency) in join_all(probes).await {
            match result {
                Ok(()) => {
                    debug!(endpoint = %endpoint, latency_ms = latency.as_millis() as u64, "Probe succeeded");
                    if fastest.map_or(true, |(_, best)| latency < best) {
                        fastest = Some((endpoint, latency));
                    }
                }
                Err(e) => debug!(endpoint = %endpoint, error = %e, "Probe failed"),
            }
        }

        match fastest {
            Some((endpoint, latency)) => ConnectivityInfo {
                status: ConnectivityStatus::Connected,
                quality: self.config.classify(latency),
                checked_at: Utc::now(),
                endpoint: Some(endpoint.clone()),
                latency: Some(latency),
                manual: false,
            },
            None => ConnectivityInfo {
                status: ConnectivityStatus::Disconnected,
                quality: ConnectionQuality::None,
                checked_at: Utc::now(),
                endpoint: None,
                latency: None,
                manual: false,
            },
        }
    }

    fn publish(&self, info: ConnectivityInfo) {
        let mut changed_to = None;
        self.tx.send_if_modified(|current| {
            let changed = !current.same_state(&info);
            *current = info;
            if changed {
                changed_to = Some(current.clone());
            }
            changed
        });

        if let Some(info) = changed_to {
            info!(
                status = ?info.status,
                quality = ?info.quality,
                manual = info.manual,
                "Connectivity changed"
            );
            if let Some(events) = &self.events {
                events.connectivity_changed(info);
            }
        }
    }

    /// Spawns the probe loop. The first cycle runs immediately.
    pub fn start(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                endpoints = self.config.endpoints.len(),
                interval_secs = self.config.interval.as_secs(),
                "Connectivity monitor started"
            );
            let mut ticker = tokio::time::interval(self.config.interval.max(MIN_PROBE_INTERVAL));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Connectivity monitor shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.run_probe_cycle().await;
                    }
                }
            }
        })
    }
}
