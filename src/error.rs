//! HTTP error mapping for the prediction service

use crate::models::runner::RunnerError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Invalid request body: {0}")]
    InvalidInput(String),

    #[error("Model runner unavailable")]
    Unavailable,

    #[error("Prediction failed: {0}")]
    Prediction(String),
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ServiceError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Prediction(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ServiceError::InvalidInput(msg) => tracing::debug!(error = %msg, "Rejected request"),
            _ => tracing::error!(error = %self, "Request failed"),
        }

        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<RunnerError> for ServiceError {
    fn from(err: RunnerError) -> Self {
        match err {
            RunnerError::Unavailable => ServiceError::Unavailable,
            RunnerError::Prediction(msg) => ServiceError::Prediction(msg),
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::InvalidInput(err.to_string())
    }
}
