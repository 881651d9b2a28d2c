//! Error responses.
//!
//! Registry errors map onto HTTP status codes:
//! ```text
//! NoBackendsRegistered, NoHealthyBackends → 503 Service Unavailable
//! InvalidAddress                         → 400 Bad Request
//! DuplicateBackend                       → 409 Conflict
//! BackendNotFound                        → 404 Not Found
//! ```
//! Bodies are JSON: `{"error": "<message>"}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::load_balancer::RegistryError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// JSON error response with the given status.
pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(ErrorBody { error: message.into() })).into_response()
}

pub fn status_for(err: &RegistryError) -> StatusCode {
    match err {
        RegistryError::NoBackendsRegistered | RegistryError::NoHealthyBackends => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        RegistryError::InvalidAddress { .. } => StatusCode::BAD_REQUEST,
        RegistryError::DuplicateBackend(_) => StatusCode::CONFLICT,
        RegistryError::BackendNotFound(_) => StatusCode::NOT_FOUND,
    }
}

impl IntoResponse for RegistryError {
    fn into_response(self) -> Response {
        error_response(status_for(&self), self.to_string())
    }
}
