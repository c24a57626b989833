pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::errors::AppError;
use crate::export::handlers;
use crate::state::AppState;

async fn not_found() -> AppError {
    AppError::NotFound("No route matches this path".to_string())
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/export", post(handlers::handle_export))
        .fallback(not_found)
        .with_state(state)
}
