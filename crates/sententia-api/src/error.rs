//! Structured API errors.
//!
//! Every failure is returned as `{"error": {"code", "message", "details"?}}`
//! with a status code chosen by the kind of failure.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sententia_core::{
    ConvertError, NotFoundError, ServiceError, TemplateError, UnsupportedFormatError,
    ValidationError, service::UnknownDemoError,
};
use serde::{Deserialize, Serialize};

/// The JSON body of an error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    /// The error.
    pub error: ErrorDetail,
}

/// What went wrong.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable code, e.g. `NOT_FOUND`.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Structured context. For validation failures, every violation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// An error returned by a handler.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The payload violates type or enum constraints (422).
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The request could not be understood (422).
    #[error("{0}")]
    BadRequest(String),

    /// The resource does not exist (404).
    #[error("{0}")]
    NotFound(String),

    /// The id is already in use (409).
    #[error("{0}")]
    Conflict(String),

    /// A template could not be rendered (422).
    #[error(transparent)]
    Template(TemplateError),

    /// The requested output format is not supported (400).
    #[error(transparent)]
    UnsupportedFormat(#[from] UnsupportedFormatError),

    /// Anything else (500). The message is logged, not returned.
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::UNPROCESSABLE_ENTITY, "BAD_REQUEST"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "DUPLICATE_ID"),
            Self::Template(_) => (StatusCode::UNPROCESSABLE_ENTITY, "TEMPLATE_ERROR"),
            Self::UnsupportedFormat(_) => (StatusCode::BAD_REQUEST, "UNSUPPORTED_FORMAT"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Validation(e) => {
                let violations: Vec<_> = e.violations.iter().collect();
                serde_json::to_value(violations).ok()
            }
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => {
                tracing::error!(error = %self, "internal server error");
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: self.details(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<ServiceError> for AppError {
    fn from(error: ServiceError) -> Self {
        match error {
            ServiceError::Validation(e) => Self::Validation(e),
            ServiceError::NotFound(e) => e.into(),
            ServiceError::DuplicateId(e) => Self::Conflict(e.to_string()),
            ServiceError::Storage(e) => Self::Internal(e.to_string()),
            ServiceError::Demo(e) => Self::Internal(e.to_string()),
        }
    }
}

impl From<NotFoundError> for AppError {
    fn from(error: NotFoundError) -> Self {
        Self::NotFound(error.to_string())
    }
}

impl From<ConvertError> for AppError {
    fn from(error: ConvertError) -> Self {
        match error {
            ConvertError::UnsupportedFormat(e) => Self::UnsupportedFormat(e),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<TemplateError> for AppError {
    fn from(error: TemplateError) -> Self {
        match error {
            TemplateError::UnknownTemplate { .. } => Self::NotFound(error.to_string()),
            other => Self::Template(other),
        }
    }
}

impl From<UnknownDemoError> for AppError {
    fn from(error: UnknownDemoError) -> Self {
        Self::NotFound(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;
    use sententia_core::{
        Candidate, Registry, RequirementId,
        domain::schema::validate,
    };

    use super::*;

    async fn body(error: AppError) -> (StatusCode, ErrorBody) {
        let response = error.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn validation_errors_list_every_violation() {
        let error = validate(&Registry::new(), &Candidate::default(), None).unwrap_err();
        let (status, body) = body(error.into()).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.error.code, "VALIDATION_ERROR");
        let details = body.error.details.unwrap();
        let fields: Vec<_> = details
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v["field"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(fields, ["title", "type", "status", "priority"]);
    }

    #[tokio::test]
    async fn not_found_maps_to_404() {
        let id: RequirementId = "R-009".parse().unwrap();
        let (status, body) = body(NotFoundError(id).into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error.code, "NOT_FOUND");
        assert!(body.error.details.is_none());
    }

    #[tokio::test]
    async fn unsupported_format_maps_to_400() {
        let error = ConvertError::from(UnsupportedFormatError("rtf".to_string()));
        let (status, body) = body(error.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error.code, "UNSUPPORTED_FORMAT");
    }

    #[tokio::test]
    async fn unknown_templates_map_to_404() {
        let error = TemplateError::UnknownTemplate {
            name: "nope".to_string(),
            available: "register".to_string(),
        };
        let (status, body) = body(error.into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error.code, "NOT_FOUND");
        assert!(body.error.message.contains("nope"));

        let (status, body) = self::body(TemplateError::UnknownFilter("shout".to_string()).into()).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.error.code, "TEMPLATE_ERROR");
    }

    #[tokio::test]
    async fn internal_messages_are_not_exposed() {
        let (status, body) = body(AppError::Internal("disk on fire".to_string())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.error.message.contains("disk"));
    }
}
