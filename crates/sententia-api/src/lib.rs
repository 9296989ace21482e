//! HTTP API over the Sententia requirements store.
//!
//! | Method | Path | |
//! |---|---|---|
//! | `GET` | `/requirements` | list, filtered by `layer`, `status`, `type`, `priority` |
//! | `POST` | `/requirements` | create |
//! | `GET` | `/requirements/view` | the register as an HTML page |
//! | `GET` `PUT` `PATCH` `DELETE` | `/requirements/:id` | read, replace, update, delete |
//! | `GET` | `/requirements/:id/history` | superseded revisions |
//! | `GET` | `/metadata/:field` | accepted values of an enumerated field |
//! | `POST` | `/load-demo/:name` | replace everything with a demo dataset |
//! | `GET` | `/export/traceability` | the link matrix, CSV by default |
//! | `GET` | `/export/:template` | a rendered document, Markdown by default |
//! | `GET` | `/health` | liveness |

pub mod error;
pub mod routes;
pub mod state;

use axum::Router;
use tower_http::trace::TraceLayer;

pub use crate::{error::AppError, state::AppState};

/// Assemble the application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::requirements::router())
        .merge(routes::metadata::router())
        .merge(routes::demo::router())
        .merge(routes::export::router())
        .merge(routes::health::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
