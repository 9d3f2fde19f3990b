use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use signalos_core::SignalError;
use signalos_platform::ErrorResponse;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid or missing API key")]
    Unauthorized,
    #[error(transparent)]
    Signal(#[from] SignalError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Signal(SignalError::Validation(_)) => StatusCode::BAD_REQUEST,
            ApiError::Signal(SignalError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Signal(SignalError::Conflict(_)) => StatusCode::CONFLICT,
            ApiError::Signal(SignalError::Delivery(_) | SignalError::Storage(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Signal(SignalError::Validation(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match &self {
            ApiError::Signal(SignalError::Storage(err)) => {
                error!("storage failure: {err:#}");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(ErrorResponse { detail })).into_response()
    }
}
