use axum::{Json, extract::State};
use serde::Serialize;
use std::sync::Arc;

use super::{ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub version: String,
    pub uptime: u64,
    pub database: String,
}

/// GET /health
/// Liveness probe: process version, uptime and store reachability.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthResponse>> {
    let database = match state.store().ping().await {
        Ok(()) => "ok".to_string(),
        Err(e) => {
            tracing::warn!("Health check database ping failed: {e}");
            "unreachable".to_string()
        }
    };

    Json(ApiResponse::success(HealthResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime: state.start_time.elapsed().as_secs(),
        database,
    }))
}
