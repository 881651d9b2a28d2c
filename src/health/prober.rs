//! Health probing.
//!
//! # Classification
//! ```text
//! 200                         → healthy
//! any other status (incl 4xx) → unhealthy
//! connect/DNS error, timeout  → unhealthy
//! ```
//!
//! A 4xx counts as unhealthy: the backend answered, but not with the
//! canonical success for its health endpoint.

use std::future::Future;
use std::time::Duration;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use tokio::time;

/// HTTP GET capability used by the health scheduler.
pub trait Probe: Send + Sync + 'static {
    /// Check one backend base address. Never fails; failures are `false`.
    fn probe(&self, address: &str, timeout: Duration) -> impl Future<Output = bool> + Send;
}

/// Map a health endpoint response status to a health flag.
pub fn classify(status: StatusCode) -> bool {
    status == StatusCode::OK
}

/// Probes `<address><path>` over plain HTTP.
///
/// Probe traffic never reuses pooled connections, so a stale keep-alive
/// socket cannot hide a backend that just went down.
#[derive(Clone)]
pub struct HttpProber {
    client: Client<HttpConnector, Body>,
    path: String,
}

impl HttpProber {
    pub fn new(path: impl Into<String>) -> Self {
        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(0)
            .build(HttpConnector::new());

        Self {
            client,
            path: path.into(),
        }
    }
}

impl Default for HttpProber {
    fn default() -> Self {
        Self::new("/health")
    }
}

impl Probe for HttpProber {
    fn probe(&self, address: &str, timeout: Duration) -> impl Future<Output = bool> + Send {
        let uri = format!("{}{}", address.trim_end_matches('/'), self.path);
        let client = self.client.clone();

        async move {
            let request = match Request::builder()
                .method("GET")
                .uri(&uri)
                .header(header::USER_AGENT, "lb-router-health-check")
                .header(header::CONNECTION, "close")
                .body(Body::empty())
            {
                Ok(req) => req,
                Err(e) => {
                    tracing::error!(uri = %uri, error = %e, "Failed to build health check request");
                    return false;
                }
            };

            match time::timeout(timeout, client.request(request)).await {
                Ok(Ok(response)) => {
                    let healthy = classify(response.status());
                    if !healthy {
                        tracing::debug!(uri = %uri, status = %response.status(), "Health check failed: unexpected status");
                    }
                    healthy
                }
                Ok(Err(e)) => {
                    tracing::debug!(uri = %uri, error = %e, "Health check failed: connection error");
                    false
                }
                Err(_) => {
                    tracing::debug!(uri = %uri, timeout = ?timeout, "Health check failed: timeout");
                    false
                }
            }
        }
    }
}
