//! Mapping of domain errors to HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use fleet_core::FleetError;

pub struct ApiError(FleetError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            FleetError::Validation { .. } => StatusCode::BAD_REQUEST,
            FleetError::NotFound { .. } => StatusCode::NOT_FOUND,
            FleetError::InvalidState(_) => StatusCode::CONFLICT,
            FleetError::ResourceUnavailable(_) => StatusCode::CONFLICT,
            FleetError::CapacityExceeded(_) => StatusCode::UNPROCESSABLE_ENTITY,
            FleetError::InvalidTransition { .. } => StatusCode::CONFLICT,
            FleetError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<FleetError> for ApiError {
    fn from(err: FleetError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self.0 {
            FleetError::Internal(detail) => {
                tracing::error!("Internal error: {}", detail);
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        let mut body = json!({
            "error": self.0.kind(),
            "message": message,
        });
        if let Some(field) = self.0.field() {
            body["field"] = json!(field);
        }
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
