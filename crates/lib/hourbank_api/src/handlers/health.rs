//! Health endpoint.

use axum::Json;
use axum::extract::State;
use tracing::warn;

use crate::AppState;
use crate::error::AppResult;
use crate::models::HealthResponse;

/// `GET /api/health`: crate version and store reachability.
pub async fn health(State(state): State<AppState>) -> AppResult<Json<HealthResponse>> {
    let store_connected = match state.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!("store ping failed: {e}");
            false
        }
    };
    Ok(Json(HealthResponse {
        version: hourbank_core::version().to_string(),
        store_connected,
    }))
}
