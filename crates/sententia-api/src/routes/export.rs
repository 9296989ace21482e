//! Document and traceability exports.

use axum::{
    Router,
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
};
use sententia_core::{Artifact, Format, convert, render, render::traceability_matrix};
use serde::Deserialize;

use crate::{AppError, AppState};

/// Assemble the export router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/export/traceability", get(traceability))
        .route("/export/:template", get(document))
}

#[derive(Debug, Default, Deserialize)]
struct ExportQuery {
    format: Option<String>,
}

impl ExportQuery {
    /// The requested format. Unknown names are an error, not a fallback.
    fn format(&self, default: Format) -> Result<Format, AppError> {
        match self.format.as_deref() {
            None => Ok(default),
            Some(name) => Ok(name.parse::<Format>()?),
        }
    }
}

/// Serve an artifact as a download named after `stem`.
fn download(artifact: &Artifact, stem: &str) -> Response {
    let disposition = format!("attachment; filename={}", artifact.file_name(stem));
    (
        [
            (header::CONTENT_TYPE, artifact.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        artifact.bytes.clone(),
    )
        .into_response()
}

/// The link matrix, CSV unless another format is asked for.
async fn traceability(
    State(state): State<AppState>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, AppError> {
    let format = query.format(Format::Csv)?;
    let markdown = traceability_matrix(&state.service.list());
    let artifact = convert(&markdown, format)?;
    Ok(download(&artifact, "traceability_matrix"))
}

/// A rendered template, Markdown unless another format is asked for.
async fn document(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, AppError> {
    let format = query.format(Format::Markdown)?;
    let template = state.templates.get(&name)?;
    let markdown = render(&state.service.list(), template, &state.render_context())?;
    let artifact = convert(&markdown, format)?;
    Ok(download(&artifact, &name))
}
