use axum::extract::State;
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;
use crate::api::v1::response::ApiResponse;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthData {
    pub status: String,
    pub database: String,
    pub model: String,
}

/// Liveness plus a storage reachability probe. Always returns 200; a
/// degraded database is reported in the payload rather than the status.
pub async fn health_check(State(state): State<AppState>) -> ApiResponse<HealthData> {
    let database = match state.store.get_stats().await {
        Ok(_) => "ok".to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "Health probe failed to reach storage");
            "error".to_string()
        }
    };

    ApiResponse::success(HealthData {
        status: "ok".to_string(),
        database,
        model: state.config.vision.model.clone(),
    })
}
