//! Accepted values of the enumerated fields.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use sententia_core::domain::EnumField;

use crate::{AppError, AppState};

/// Assemble the metadata router.
pub fn router() -> Router<AppState> {
    Router::new().route("/metadata/:field", get(values))
}

/// Resolve a path segment to a field. The plural names are the established
/// ones; any spelling [`EnumField`] parses is also accepted.
fn field(name: &str) -> Option<EnumField> {
    match name {
        "types" => Some(EnumField::Type),
        "layers" => Some(EnumField::Layer),
        "link-types" => Some(EnumField::LinkType),
        other => other.parse().ok(),
    }
}

/// The values currently accepted, in declaration order. Retired values are
/// left out.
async fn values(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<&'static str>>, AppError> {
    let field = field(&name)
        .ok_or_else(|| AppError::NotFound(format!("no metadata for '{name}'")))?;
    Ok(Json(state.service.registry().values(field)))
}
