//! Bundled demo datasets.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use sententia_core::service::Demo;
use serde_json::json;

use crate::{AppError, AppState};

/// Assemble the demo router.
pub fn router() -> Router<AppState> {
    Router::new().route("/load-demo/:name", post(load))
}

/// Clear the store and load the named dataset.
async fn load(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let demo: Demo = name.parse()?;
    let count = state.service.load_demo(demo)?;
    Ok(Json(json!({
        "message": format!("{demo} demo data loaded successfully."),
        "count": count,
    })))
}
