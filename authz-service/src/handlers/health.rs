use axum::{extract::State, Json};

use crate::AppState;
use service_core::error::AppError;

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let snapshot = state.engine.registry().snapshot();

    Ok(Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
        "checks": {
            "webservices": snapshot.len()
        }
    })))
}
