//! Transport backed by `reqwest`.

use super::{Transport, TransportError, TransportResponse};
use crate::request::{Headers, Method, Request};
use futures::future::BoxFuture;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Default User-Agent sent when the request does not set one.
const DEFAULT_USER_AGENT: &str = concat!("holdfast/", env!("CARGO_PKG_VERSION"));

/// Fallback timeout used by the underlying client.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(60);

/// Async HTTP transport using reqwest.
///
/// Connection pooling and TLS are left to reqwest. Errors are classified by
/// reqwest's own predicates: connect failures become
/// [`TransportError::Connect`], timeouts become [`TransportError::Timeout`],
/// everything else [`TransportError::Other`].
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Creates a transport with default client settings.
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(CLIENT_TIMEOUT)
            .user_agent(DEFAULT_USER_AGENT)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(30))
            .tcp_nodelay(true)
            .build()
            .map_err(|e| TransportError::Other(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// Wraps an already configured client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn to_reqwest_method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Head => reqwest::Method::HEAD,
            Method::Options => reqwest::Method::OPTIONS,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
        }
    }

    fn map_error(error: reqwest::Error, timeout: Option<Duration>) -> TransportError {
        if error.is_timeout() {
            TransportError::Timeout(timeout.unwrap_or(CLIENT_TIMEOUT))
        } else if error.is_connect() {
            TransportError::Connect(error.to_string())
        } else {
            TransportError::Other(error.to_string())
        }
    }

    async fn execute(&self, request: &Request) -> Result<TransportResponse, TransportError> {
        let uri = request.uri();
        trace!(method = %request.method(), uri = uri, "HTTP request starting");

        let mut builder = self
            .client
            .request(Self::to_reqwest_method(request.method()), uri);
        for (name, value) in request.headers().iter() {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body() {
            builder = builder.body(body.clone());
        }
        if let Some(timeout) = request.timeout() {
            builder = builder.timeout(timeout);
        }

        let response = match builder.send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!(
                    uri = uri,
                    error = %e,
                    is_connect = e.is_connect(),
                    is_timeout = e.is_timeout(),
                    "HTTP request failed"
                );
                return Err(Self::map_error(e, request.timeout()));
            }
        };

        let status = response.status().as_u16();
        let headers: Headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| Self::map_error(e, request.timeout()))?;

        debug!(uri = uri, status = status, bytes = body.len(), "HTTP response received");

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

impl Transport for ReqwestTransport {
    fn send<'a>(
        &'a self,
        request: &'a Request,
    ) -> BoxFuture<'a, Result<TransportResponse, TransportError>> {
        Box::pin(self.execute(request))
    }
}
