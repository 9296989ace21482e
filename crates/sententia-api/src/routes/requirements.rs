//! Requirement CRUD.

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::Html,
    routing::get,
};
use sententia_core::{
    Candidate, Format, Patch, Requirement, RequirementId, convert, domain::Revision, render,
    service::Filter,
};
use serde_json::json;

use crate::{AppError, AppState};

/// Assemble the requirements router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/requirements", get(list).post(create))
        .route("/requirements/view", get(view))
        .route(
            "/requirements/:id",
            get(fetch).put(replace).patch(update).delete(remove),
        )
        .route("/requirements/:id/history", get(history))
}

/// A path id that does not parse cannot name an existing requirement.
fn parse_id(raw: &str) -> Result<RequirementId, AppError> {
    raw.parse()
        .map_err(|_| AppError::NotFound(format!("requirement {raw} not found")))
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(value)| value)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

async fn list(
    State(state): State<AppState>,
    filter: Result<Query<Filter>, QueryRejection>,
) -> Result<Json<Vec<Requirement>>, AppError> {
    let Query(filter) = filter.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    Ok(Json(state.service.list_filtered(&filter)))
}

async fn create(
    State(state): State<AppState>,
    payload: Result<Json<Candidate>, JsonRejection>,
) -> Result<(StatusCode, Json<Requirement>), AppError> {
    let candidate = body(payload)?;
    let requirement = state.service.create(&candidate)?;
    Ok((StatusCode::CREATED, Json(requirement)))
}

async fn fetch(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Requirement>, AppError> {
    Ok(Json(state.service.get(&parse_id(&id)?)?))
}

async fn replace(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<Candidate>, JsonRejection>,
) -> Result<Json<Requirement>, AppError> {
    let id = parse_id(&id)?;
    let candidate = body(payload)?;
    Ok(Json(state.service.replace(&id, &candidate)?))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<Patch>, JsonRejection>,
) -> Result<Json<Requirement>, AppError> {
    let id = parse_id(&id)?;
    let patch = body(payload)?;
    Ok(Json(state.service.update(&id, patch)?))
}

async fn remove(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let id = parse_id(&id)?;
    state.service.delete(&id)?;
    Ok(Json(json!({
        "message": "Requirement deleted successfully",
        "id": id,
    })))
}

async fn history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Revision>>, AppError> {
    Ok(Json(state.service.history(&parse_id(&id)?)?))
}

/// The register rendered as a standalone HTML page.
async fn view(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let template = state.templates.get("register")?;
    let markdown = render(&state.service.list(), template, &state.render_context())?;
    let artifact = convert(&markdown, Format::Html)?;
    let fragment = String::from_utf8_lossy(&artifact.bytes);

    Ok(Html(format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{fragment}</body>\n</html>\n",
        template.document
    )))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::routes::test_support::{body_bytes, body_json, send, test_app};

    fn login() -> serde_json::Value {
        json!({
            "title": "Login",
            "type": "Functional",
            "status": "Draft",
            "priority": "High",
            "layer": "Software",
            "links": [{"target_id": "BUS-001", "type": "Satisfies"}],
        })
    }

    #[tokio::test]
    async fn create_then_get() {
        let (app, _) = test_app();

        let response = send(&app, "POST", "/requirements", Some(login())).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = body_json(response).await;
        assert_eq!(created["id"], "R-001");
        assert_eq!(created["links"][0]["target_id"], "BUS-001");

        let response = send(&app, "GET", "/requirements/R-001", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, created);
    }

    #[tokio::test]
    async fn invalid_payloads_report_every_violation() {
        let (app, state) = test_app();
        let payload = json!({"title": "", "type": "Wish", "priority": "High"});

        let response = send(&app, "POST", "/requirements", Some(payload)).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["details"].as_array().unwrap().len(), 3);
        assert!(state.service.list().is_empty());
    }

    #[tokio::test]
    async fn malformed_json_is_rejected() {
        let (app, _) = test_app();
        let response = send(&app, "POST", "/requirements", Some(json!([1, 2]))).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(response).await["error"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn duplicate_ids_conflict() {
        let (app, _) = test_app();
        let mut payload = login();
        payload["id"] = json!("SYS-001");

        let first = send(&app, "POST", "/requirements", Some(payload.clone())).await;
        assert_eq!(first.status(), StatusCode::CREATED);
        let second = send(&app, "POST", "/requirements", Some(payload)).await;
        assert_eq!(second.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(second).await["error"]["code"], "DUPLICATE_ID");
    }

    #[tokio::test]
    async fn patch_records_history() {
        let (app, _) = test_app();
        send(&app, "POST", "/requirements", Some(login())).await;

        let response = send(
            &app,
            "PATCH",
            "/requirements/R-001",
            Some(json!({"status": "Approved", "layer": null})),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        let updated = body_json(response).await;
        assert_eq!(updated["status"], "Approved");
        assert!(updated["layer"].is_null());

        let response = send(&app, "GET", "/requirements/R-001/history", None).await;
        let history = body_json(response).await;
        assert_eq!(history.as_array().unwrap().len(), 1);
        assert_eq!(history[0]["fields"]["status"], "Draft");
    }

    #[tokio::test]
    async fn put_replaces_every_field() {
        let (app, _) = test_app();
        send(&app, "POST", "/requirements", Some(login())).await;

        let replacement = json!({
            "title": "Sign in",
            "type": "Functional",
            "status": "Proposed",
            "priority": "Low",
        });
        let response = send(&app, "PUT", "/requirements/R-001", Some(replacement)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let replaced = body_json(response).await;
        assert_eq!(replaced["title"], "Sign in");
        assert!(replaced["layer"].is_null());
        assert_eq!(replaced["links"], json!([]));
    }

    #[tokio::test]
    async fn list_filters_by_query() {
        let (app, _) = test_app();
        send(&app, "POST", "/requirements", Some(login())).await;
        let mut other = login();
        other["layer"] = json!("Business");
        send(&app, "POST", "/requirements", Some(other)).await;

        let response = send(&app, "GET", "/requirements?layer=business", None).await;
        let listed = body_json(response).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["id"], "R-002");

        let response = send(&app, "GET", "/requirements?status=shipped", None).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn delete_twice_is_not_found() {
        let (app, _) = test_app();
        send(&app, "POST", "/requirements", Some(login())).await;

        let first = send(&app, "DELETE", "/requirements/R-001", None).await;
        assert_eq!(first.status(), StatusCode::OK);
        let second = send(&app, "DELETE", "/requirements/R-001", None).await;
        assert_eq!(second.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(second).await["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn malformed_ids_are_not_found() {
        let (app, _) = test_app();
        let response = send(&app, "GET", "/requirements/nonsense", None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn view_renders_html() {
        let (app, _) = test_app();
        send(&app, "POST", "/requirements", Some(login())).await;

        let response = send(&app, "GET", "/requirements/view", None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let page = String::from_utf8(body_bytes(response).await).unwrap();
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("<td>Login</td>"));
    }

    #[tokio::test]
    async fn view_escapes_markup_in_values() {
        let (app, _) = test_app();
        let mut payload = login();
        payload["title"] = json!("<script>alert(1)</script>");
        payload["description"] = json!("Insert a <br> tag");
        send(&app, "POST", "/requirements", Some(payload)).await;

        let response = send(&app, "GET", "/requirements/view", None).await;
        let page = String::from_utf8(body_bytes(response).await).unwrap();
        assert!(!page.contains("<script>"));
        assert!(page.contains("<td>&lt;script&gt;alert(1)&lt;/script&gt;</td>"));
        assert!(page.contains("<td>Insert a &lt;br&gt; tag</td>"));
    }
}
