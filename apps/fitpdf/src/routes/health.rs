use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Returns a simple status object with service version and the active export limits.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": "0.1.0",
        "service": "fitpdf",
        "conversion_timeout_ms": state.config.conversion_timeout_ms,
        "cache_enabled": state.cache.is_enabled()
    }))
}
