//! Network reachability monitoring.
//!
//! The [`ConnectivityMonitor`] probes a set of endpoints on an interval
//! through a [`Prober`] and publishes a [`ConnectivityInfo`] snapshot. It
//! also carries a manual offline override that wins over probe results.

mod monitor;
mod probe;
mod types;

pub use monitor::{ConnectivityMonitor, MonitorConfig, MIN_PROBE_INTERVAL};
pub use probe::{HttpProber, MockProber, ProbeError, Prober, TcpProber};
pub use types::{ConnectionQuality, ConnectivityInfo, ConnectivityStatus};
