use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use landing_zone_core::CoreError;
use orchestrator::{OrchestratorError, Violation};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    /// Deletion refused; nothing was deleted
    Blocked(Vec<Violation>),
    Internal(String),
    Orchestrator(OrchestratorError),
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub violations: Option<Vec<Violation>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut violations = None;
        let (status, error_type, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg),
            AppError::Blocked(found) => {
                let message = format!("Deletion blocked by {} violation(s)", found.len());
                violations = Some(found);
                (StatusCode::CONFLICT, "deletion_blocked", message)
            }
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
            AppError::Orchestrator(err) => match err {
                OrchestratorError::LandingZoneNotFound(_) | OrchestratorError::FlightNotFound(_) => {
                    (StatusCode::NOT_FOUND, "not_found", err.to_string())
                }
                OrchestratorError::UnknownDefinition(_)
                | OrchestratorError::MissingRequiredInput(_)
                | OrchestratorError::Configuration(_)
                | OrchestratorError::Core(CoreError::Validation(_)) => {
                    (StatusCode::BAD_REQUEST, "bad_request", err.to_string())
                }
                OrchestratorError::DeletionInProgress(_) => {
                    (StatusCode::CONFLICT, "deletion_in_progress", err.to_string())
                }
                OrchestratorError::DeletionBlocked { violations: found } => {
                    return AppError::Blocked(found).into_response();
                }
                other => {
                    tracing::error!(error = %other, "Request failed");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        "internal_error",
                        other.to_string(),
                    )
                }
            },
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
            violations,
        });

        (status, body).into_response()
    }
}

impl From<OrchestratorError> for AppError {
    fn from(err: OrchestratorError) -> Self {
        AppError::Orchestrator(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_status_codes() {
        let cases = [
            (
                AppError::from(OrchestratorError::LandingZoneNotFound(Uuid::new_v4())),
                StatusCode::NOT_FOUND,
            ),
            (
                AppError::from(OrchestratorError::UnknownDefinition("x".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::from(OrchestratorError::DeletionInProgress(Uuid::new_v4())),
                StatusCode::CONFLICT,
            ),
            (
                AppError::from(OrchestratorError::DeletionBlocked { violations: vec![] }),
                StatusCode::CONFLICT,
            ),
            (
                AppError::from(OrchestratorError::Cancelled(Uuid::new_v4())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }
}
