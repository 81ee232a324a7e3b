//! Reachability probes.

use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;

/// Errors from a single probe.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),

    #[error("probe failed: {0}")]
    Unreachable(String),

    #[error("invalid probe endpoint {0:?}")]
    InvalidEndpoint(String),
}

/// Checks whether one endpoint is reachable.
///
/// The monitor measures latency around the call; implementations only
/// report success or failure.
pub trait Prober: Send + Sync + 'static {
    fn probe<'a>(&'a self, endpoint: &'a str, timeout: Duration)
        -> BoxFuture<'a, Result<(), ProbeError>>;
}

/// Opens a TCP connection to `host:port`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpProber;

impl Prober for TcpProber {
    fn probe<'a>(
        &'a self,
        endpoint: &'a str,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<(), ProbeError>> {
        Box::pin(async move {
            if !endpoint.contains(':') {
                return Err(ProbeError::InvalidEndpoint(endpoint.to_string()));
            }
            match tokio::time::timeout(timeout, TcpStream::connect(endpoint)).await {
                Ok(Ok(_stream)) => Ok(()),
                Ok(Err(e)) => Err(ProbeError::Unreachable(e.to_string())),
                Err(_) => Err(ProbeError::Timeout(timeout)),
            }
        })
    }
}

/// Sends a HEAD request. Any HTTP response counts as reachable.
#[derive(Clone)]
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpProber {
    fn default() -> Self {
        Self::new()
    }
}

impl Prober for HttpProber {
    fn probe<'a>(
        &'a self,
        endpoint: &'a str,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<(), ProbeError>> {
        Box::pin(async move {
            match self.client.head(endpoint).timeout(timeout).send().await {
                Ok(_) => Ok(()),
                Err(e) if e.is_timeout() => Err(ProbeError::Timeout(timeout)),
                Err(e) if e.is_builder() => Err(ProbeError::InvalidEndpoint(endpoint.to_string())),
                Err(e) => Err(ProbeError::Unreachable(e.to_string())),
            }
        })
    }
}

/// Prober with scripted per-endpoint results, for tests.
///
/// Unscripted endpoints are unreachable. Clones share the same script.
#[derive(Clone, Default)]
pub struct MockProber {
    results: Arc<Mutex<HashMap<String, Result<Duration, ProbeError>>>>,
}

impl MockProber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `endpoint` reachable after `latency`.
    pub fn reachable(&self, endpoint: &str, latency: Duration) {
        self.results
            .lock()
            .insert(endpoint.to_string(), Ok(latency));
    }

    pub fn unreachable(&self, endpoint: &str) {
        self.results.lock().insert(
            endpoint.to_string(),
            Err(ProbeError::Unreachable("scripted".into())),
        );
    }
}

impl Prober for MockProber {
    fn probe<'a>(
        &'a self,
        endpoint: &'a str,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<(), ProbeError>> {
        let scripted = self.results.lock().get(endpoint).cloned();
        Box::pin(async move {
            match scripted {
                Some(Ok(latency)) if latency > timeout => {
                    tokio::time::sleep(timeout).await;
                    Err(ProbeError::Timeout(timeout))
                }
                Some(Ok(latency)) => {
                    tokio::time::sleep(latency).await;
                    Ok(())
                }
                Some(Err(e)) => Err(e),
                None => Err(ProbeError::Unreachable(format!("{} not scripted", endpoint))),
            }
        })
    }
}
