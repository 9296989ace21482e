//! Liveness.

use axum::{Json, Router, extract::State, routing::get};
use serde_json::json;

use crate::AppState;

/// Assemble the health router.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "requirements": state.service.list().len(),
    }))
}
