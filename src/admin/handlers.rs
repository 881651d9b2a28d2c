use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};

use crate::admin::AdminState;
use crate::load_balancer::{BackendView, RegistryError};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub backends: usize,
    pub healthy_backends: usize,
}

/// Body of add/remove requests. `URL` is accepted for older clients.
#[derive(Debug, Deserialize)]
pub struct BackendInput {
    #[serde(alias = "URL")]
    pub url: String,
}

#[derive(Serialize)]
pub struct RemovedBackend {
    pub status: &'static str,
    pub removed: BackendView,
}

pub async fn health() -> &'static str {
    "OK"
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let snapshot = state.registry.snapshot();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        backends: snapshot.len(),
        healthy_backends: snapshot.iter().filter(|b| b.healthy).count(),
    })
}

pub async fn list_backends(State(state): State<AdminState>) -> Json<Vec<BackendView>> {
    Json(state.registry.snapshot())
}

pub async fn add_backend(
    State(state): State<AdminState>,
    Json(input): Json<BackendInput>,
) -> Result<impl IntoResponse, RegistryError> {
    let backend = state.registry.add_backend(&input.url)?;
    Ok((StatusCode::CREATED, Json(backend.view())))
}

pub async fn remove_backend(
    State(state): State<AdminState>,
    Json(input): Json<BackendInput>,
) -> Result<Json<RemovedBackend>, RegistryError> {
    let backend = state.registry.remove_backend(&input.url)?;
    Ok(Json(RemovedBackend {
        status: "success",
        removed: backend.view(),
    }))
}
