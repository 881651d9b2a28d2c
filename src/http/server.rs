//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router that forwards every path and method
//! - Wire up middleware (request ID, tracing, timeout)
//! - Acquire a backend per request, forward, release
//! - Serve until the shutdown broadcast fires

use axum::{
    Router,
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
};
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::RouterConfig;
use crate::http::forward;
use crate::http::request::{MakeRequestUuid, X_REQUEST_ID, request_id};
use crate::http::response::error_response;
use crate::load_balancer::Registry;
use crate::observability::metrics;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub client: Client<HttpConnector, Body>,
}

/// HTTP server for the proxy listener.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server forwarding to backends of `registry`.
    pub fn new(config: &RouterConfig, registry: Arc<Registry>) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.timeouts.connect_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        let state = AppState { registry, client };

        let router = Self::build_router(config, state);
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// A request that outlives `timeouts.request_secs` is answered with
    /// 504 Gateway Timeout and its backend slot is released.
    fn build_router(config: &RouterConfig, state: AppState) -> Router {
        Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
                    .layer(TimeoutLayer::with_status_code(
                        StatusCode::GATEWAY_TIMEOUT,
                        Duration::from_secs(config.timeouts.request_secs),
                    )),
            )
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Proxy listener starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Proxy listener stopped");
        Ok(())
    }
}

/// Main proxy handler.
/// Acquires a backend, forwards the request, and releases on completion.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(&request);
    let method = request.method().to_string();
    let client_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip());

    let guard = match state.registry.acquire_guard() {
        Ok(g) => g,
        Err(e) => {
            tracing::warn!(request_id = %request_id, error = %e, "Rejecting request");
            metrics::record_request(&method, 503, "none", start_time);
            return e.into_response();
        }
    };
    let backend = guard.address().to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %request.uri().path(),
        backend = %backend,
        "Proxying request"
    );

    match forward::forward(&state.client, guard, request, client_ip).await {
        Ok(response) => {
            metrics::record_request(&method, response.status().as_u16(), &backend, start_time);
            response
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, backend = %backend, error = %e, "Upstream error");
            metrics::record_request(&method, 502, &backend, start_time);
            error_response(StatusCode::BAD_GATEWAY, "upstream request failed")
        }
    }
}
