//! Management API.
//!
//! ```text
//! GET    /health           liveness of the router itself
//! GET    /admin/status     version and backend counts
//! GET    /admin/backends   snapshot of every backend
//! POST   /admin/backends   {"url": ...} → register
//! DELETE /admin/backends   {"url": ...} → deregister
//! ```
//!
//! `/admin/*` requires `Authorization: Bearer <api_key>` when a key is configured.

pub mod auth;
pub mod handlers;

use axum::{
    Router,
    middleware,
    routing::get,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::config::AdminConfig;
use crate::load_balancer::Registry;
use self::auth::admin_auth_middleware;
use self::handlers::*;

/// State shared by admin handlers.
#[derive(Clone)]
pub struct AdminState {
    pub registry: Arc<Registry>,
    pub api_key: Option<Arc<str>>,
}

impl AdminState {
    pub fn new(registry: Arc<Registry>, config: &AdminConfig) -> Self {
        Self {
            registry,
            api_key: config.api_key.as_deref().filter(|k| !k.is_empty()).map(Arc::from),
        }
    }
}

pub fn setup_admin_router(state: AdminState) -> Router {
    let admin = Router::new()
        .route("/admin/status", get(get_status))
        .route(
            "/admin/backends",
            get(list_backends).post(add_backend).delete(remove_backend),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware));

    Router::new()
        .route("/health", get(health))
        .merge(admin)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Serve the admin API until `shutdown` fires.
pub async fn serve(
    listener: TcpListener,
    state: AdminState,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    tracing::info!(address = %listener.local_addr()?, "Admin listener starting");
    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await
}
