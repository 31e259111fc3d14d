//! Error-to-status mapping.
//!
//! Components log and re-raise their own typed errors; this is the only
//! place they become HTTP status codes. Every error body is
//! `{"detail": "..."}`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use quickmt_langid::LangIdError;
use quickmt_runtime::RuntimeError;
use serde_json::json;

/// An error ready to leave the API boundary.
#[derive(Debug)]
pub struct ApiError {
    /// HTTP status to respond with.
    pub status: StatusCode,
    /// Human-readable detail string.
    pub detail: String,
}

impl ApiError {
    /// 503 — a component is not initialized yet.
    pub fn unavailable(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            detail: detail.into(),
        }
    }

    /// 422 — request body failed validation.
    pub fn unprocessable(detail: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            detail: detail.into(),
        }
    }
}

impl From<RuntimeError> for ApiError {
    fn from(err: RuntimeError) -> Self {
        let status = match &err {
            RuntimeError::ModelNotFound { .. } => StatusCode::NOT_FOUND,
            RuntimeError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            RuntimeError::LangId(LangIdError::Unavailable) => StatusCode::SERVICE_UNAVAILABLE,
            RuntimeError::Load(_)
            | RuntimeError::Translation(_)
            | RuntimeError::Closed
            | RuntimeError::LangId(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            detail: err.to_string(),
        }
    }
}

impl From<LangIdError> for ApiError {
    fn from(err: LangIdError) -> Self {
        let status = match &err {
            LangIdError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            detail: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}
