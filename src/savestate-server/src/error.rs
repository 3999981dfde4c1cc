//! Response envelope and error mapping for the HTTP API.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use savestate_engine::{EngineError, Outcome};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// Body of every response: `{ success, message, details?, code?, warnings?, data? }`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// Machine-readable error code. Failures only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            details: None,
            code: None,
            warnings: Vec::new(),
            data: Some(data),
        }
    }
}

impl<T> From<Outcome<T>> for ApiResponse<T> {
    fn from(outcome: Outcome<T>) -> Self {
        Self {
            warnings: outcome.warnings,
            ..Self::ok(outcome.message, outcome.value)
        }
    }
}

/// Application error type.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Failure reported by the engine.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Request body or query could not be decoded.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl ApiError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Engine(e) => match e {
                EngineError::NotFound(_) | EngineError::NoInterruptedWork => StatusCode::NOT_FOUND,
                EngineError::Busy { .. } | EngineError::InterruptedWorkPending => {
                    StatusCode::CONFLICT
                }
                EngineError::NotAuthorized => StatusCode::FORBIDDEN,
                EngineError::InvalidInput(_) => StatusCode::UNPROCESSABLE_ENTITY,
                EngineError::Remote { .. } => StatusCode::BAD_GATEWAY,
                EngineError::Git { .. }
                | EngineError::Storage(_)
                | EngineError::Io(_)
                | EngineError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Get the error code string.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Engine(e) => e.code(),
        }
    }

    fn body(&self) -> ApiResponse<()> {
        let details = match self {
            Self::Engine(e) => e.details().map(str::to_string),
            Self::BadRequest(_) => None,
        };
        ApiResponse {
            success: false,
            message: self.to_string(),
            details,
            code: Some(self.error_code()),
            warnings: Vec::new(),
            data: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(code = self.error_code(), error = %self, "Request failed");
        } else {
            warn!(code = self.error_code(), error = %self, "Request rejected");
        }

        (status, Json(self.body())).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(error: serde_json::Error) -> Self {
        Self::BadRequest(error.to_string())
    }
}

/// Result type for the API handlers.
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;
