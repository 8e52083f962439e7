//! Backend registry handlers.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use tracing::{info, warn};

use crate::http::responses::{BackendResponse, ErrorResponse, ReloadResponse};
use crate::registry::RegistryError;
use crate::state::AppState;

/// List registered backends with their pool residency.
pub async fn list_backends(State(state): State<Arc<AppState>>) -> Json<Vec<BackendResponse>> {
    let table = state.registry.table();
    let handles = state.pool.snapshot();

    let response = table
        .profiles()
        .into_iter()
        .map(|profile| {
            let handle = handles.iter().find(|h| h.backend == profile.backend());
            BackendResponse::new(profile, handle)
        })
        .collect();
    Json(response)
}

/// Re-read the registry file and publish it.
pub async fn reload_registry(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReloadResponse>, (StatusCode, Json<ErrorResponse>)> {
    match state.registry.reload() {
        Ok(backends) => {
            info!(backends, "Registry reloaded via HTTP");
            Ok(Json(ReloadResponse { backends }))
        }
        Err(e) => {
            warn!(error = %e, "Registry reload failed");
            let status = match e {
                RegistryError::NoSource => StatusCode::CONFLICT,
                _ => StatusCode::UNPROCESSABLE_ENTITY,
            };
            Err((
                status,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            ))
        }
    }
}
