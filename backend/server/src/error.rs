use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use store::MaintenanceError;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error(transparent)]
    Maintenance(#[from] MaintenanceError),
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::MalformedPayload(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::MalformedPayload(rejection.body_text())
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::MalformedPayload(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AppError::Maintenance(err) => match err {
                MaintenanceError::NotFound(_) | MaintenanceError::EquipmentNotFound(_) => {
                    (StatusCode::NOT_FOUND, "NOT_FOUND")
                }
                MaintenanceError::InvalidStatus(_) => (StatusCode::BAD_REQUEST, "INVALID_STATUS"),
                MaintenanceError::InvalidPriority(_) | MaintenanceError::InvalidRequestType(_) => {
                    (StatusCode::BAD_REQUEST, "BAD_REQUEST")
                }
                MaintenanceError::Conflict { .. } => (StatusCode::CONFLICT, "CONFLICT"),
                MaintenanceError::UnknownStatusBucket { .. } => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "UNKNOWN_STATUS_BUCKET")
                }
                MaintenanceError::StoreUnavailable(_) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "STORE_UNAVAILABLE")
                }
            },
        };

        if status.is_server_error() {
            error!("{self}");
        }

        let body = ErrorResponse {
            error: self.to_string(),
            code,
        };

        (status, Json(body)).into_response()
    }
}
