use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::appointment::{LifecycleError, ValidationError};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorObject,
}

#[derive(Debug, Serialize)]
pub struct ErrorObject {
    pub code: String,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    Unauthorized(&'static str, String),
    Forbidden(&'static str, String),
    BadRequest(&'static str, String),
    NotFound(&'static str, String),
    Conflict(&'static str, String),
    Internal(String),
}

impl ApiError {
    pub fn invalid_credentials() -> Self {
        ApiError::Unauthorized("INVALID_CREDENTIALS", "Username or password is incorrect".into())
    }

    pub fn session_expired() -> Self {
        ApiError::Unauthorized("SESSION_EXPIRED", "Session expired".into())
    }

    pub fn db(e: sqlx::Error) -> Self {
        ApiError::Internal(format!("db error: {e}"))
    }

    fn to_error_response(code: &str, message: &str) -> Json<ErrorResponse> {
        Json(ErrorResponse {
            error: ErrorObject {
                code: code.to_string(),
                message: message.to_string(),
            },
        })
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::BadRequest("VALIDATION_ERROR", e.to_string())
    }
}

impl From<LifecycleError> for ApiError {
    fn from(e: LifecycleError) -> Self {
        match e {
            LifecycleError::InvalidTransition { .. } => {
                ApiError::Conflict("INVALID_TRANSITION", e.to_string())
            }
            LifecycleError::TerminalState(_) => ApiError::Conflict("APPOINTMENT_CLOSED", e.to_string()),
            LifecycleError::ExamsIncomplete => ApiError::Conflict("EXAMS_INCOMPLETE", e.to_string()),
            LifecycleError::NotCheckedIn => ApiError::Conflict("NOT_CHECKED_IN", e.to_string()),
            LifecycleError::ExamIndexOutOfRange { .. } => {
                ApiError::NotFound("EXAM_NOT_FOUND", e.to_string())
            }
            LifecycleError::MissingCancellationReason => {
                ApiError::BadRequest("VALIDATION_ERROR", e.to_string())
            }
            LifecycleError::Validation(v) => v.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(code, msg) => {
                (StatusCode::UNAUTHORIZED, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::Forbidden(code, msg) => {
                (StatusCode::FORBIDDEN, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::BadRequest(code, msg) => {
                (StatusCode::BAD_REQUEST, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::NotFound(code, msg) => {
                (StatusCode::NOT_FOUND, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::Conflict(code, msg) => {
                (StatusCode::CONFLICT, ApiError::to_error_response(code, &msg)).into_response()
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError::to_error_response("INTERNAL", &msg),
                )
                    .into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appointment::AppointmentStatus;

    fn status_of(e: impl Into<ApiError>) -> StatusCode {
        let api: ApiError = e.into();
        api.into_response().status()
    }

    #[test]
    fn lifecycle_errors_map_to_http_status() {
        assert_eq!(
            status_of(LifecycleError::InvalidTransition {
                from: AppointmentStatus::Scheduled,
                to: AppointmentStatus::Completed,
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(LifecycleError::TerminalState(AppointmentStatus::Cancelled)),
            StatusCode::CONFLICT
        );
        assert_eq!(status_of(LifecycleError::ExamsIncomplete), StatusCode::CONFLICT);
        assert_eq!(status_of(LifecycleError::NotCheckedIn), StatusCode::CONFLICT);
        assert_eq!(
            status_of(LifecycleError::ExamIndexOutOfRange { index: 4, len: 2 }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(LifecycleError::MissingCancellationReason),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(LifecycleError::Validation(ValidationError::NotesTooLong(501))),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn validation_error_keeps_message() {
        let api: ApiError = ValidationError::InvalidScheduledTime("7:5".into()).into();
        match api {
            ApiError::BadRequest(code, msg) => {
                assert_eq!(code, "VALIDATION_ERROR");
                assert!(msg.contains("7:5"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
