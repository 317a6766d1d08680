//! Mapping from core errors to HTTP responses.

use api_shared::ErrorRes;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use qms_core::QueueError;

/// Handler error: a [`QueueError`] rendered as `{"error": kind, "message": display}`.
#[derive(Debug)]
pub struct ApiError(pub QueueError);

impl From<QueueError> for ApiError {
    fn from(e: QueueError) -> Self {
        Self(e)
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

pub fn status_for(error: &QueueError) -> StatusCode {
    match error {
        QueueError::UnknownDepartment(_)
        | QueueError::UnknownEntry(_)
        | QueueError::UnknownPatient(_)
        | QueueError::UnknownAppointment(_)
        | QueueError::NotInQueue(_) => StatusCode::NOT_FOUND,
        QueueError::AlreadyQueued { .. }
        | QueueError::AppointmentConflict(_)
        | QueueError::DuplicateDepartment(_)
        | QueueError::DuplicatePatient(_) => StatusCode::CONFLICT,
        QueueError::InvalidTransition { .. }
        | QueueError::InvalidAppointmentTransition { .. }
        | QueueError::ConsultationLimitReached { .. }
        | QueueError::ProviderBusy(_) => StatusCode::UNPROCESSABLE_ENTITY,
        QueueError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        QueueError::ConfigRead(_) | QueueError::ConfigParse(_) | QueueError::LockPoisoned(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            tracing::error!("request failed: {:?}", self.0);
        } else {
            tracing::debug!(kind = self.0.kind(), "request rejected: {}", self.0);
        }

        let body = ErrorRes {
            error: self.0.kind().to_string(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
