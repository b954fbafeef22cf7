use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::domain::errors::DomainError;

/// API error type with HTTP status code, message and machine-readable kind
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub kind: Option<String>,
    pub detail: Option<String>,
}

impl ApiError {
    /// Creates a new API error
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            kind: None,
            detail: None,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    /// Creates a 400 Bad Request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message).with_kind("invalid_input")
    }

    /// Creates a 404 Not Found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message).with_kind("not_found")
    }

    /// Creates a 500 Internal Server Error; the cause goes in `detail`
    pub fn internal_server_error(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Internal server error".to_string(),
            kind: None,
            detail: Some(detail.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, detail = ?self.detail, "{}", self.message);
        }

        let mut body = json!({ "error": self.message });
        if let Some(kind) = self.kind {
            body["kind"] = json!(kind);
        }
        if let Some(detail) = self.detail {
            body["detail"] = json!(detail);
        }

        (self.status, Json(body)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        let status = match &error {
            DomainError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            DomainError::NotFound { .. }
            | DomainError::AgentNotFound(_)
            | DomainError::NotDispatchable { .. } => StatusCode::NOT_FOUND,
            DomainError::InvalidTransition { .. } | DomainError::AlreadyPlanned(_) => {
                StatusCode::CONFLICT
            }
            DomainError::NoCapableAgent(_)
            | DomainError::CyclicDependency(_)
            | DomainError::InvalidPlan(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };

        Self::new(status, error.to_string()).with_kind(error.kind())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}
