use landing_zone_core::CoreError;
use thiserror::Error;
use uuid::Uuid;

use crate::deletion::Violation;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Missing required input: {0}")]
    MissingRequiredInput(String),

    #[error("Invalid flight status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Cloud error: {0}")]
    Cloud(#[from] cloud::CloudError),

    #[error("Database error: {0}")]
    Database(#[from] db::DbError),

    #[error("Core error: {0}")]
    Core(CoreError),

    #[error("Deletion blocked: {}", format_violations(.violations))]
    DeletionBlocked { violations: Vec<Violation> },

    #[error("Deletion already in progress for landing zone {0}")]
    DeletionInProgress(Uuid),

    #[error("Sub-flight {flight_id} did not finish within {cycles} poll cycles")]
    SubOperationTimeout { flight_id: Uuid, cycles: u32 },

    #[error("Sub-flight {flight_id} failed: {reason}")]
    SubOperationFailed { flight_id: Uuid, reason: String },

    #[error("Expected landing zone result '{key}' from sub-flight {flight_id} not found")]
    SubOperationResultMissing { flight_id: Uuid, key: String },

    #[error("Flight not found: {0}")]
    FlightNotFound(Uuid),

    #[error("Flight {0} was cancelled")]
    Cancelled(Uuid),

    #[error("Landing zone not found: {0}")]
    LandingZoneNotFound(Uuid),

    #[error("Unknown landing zone definition: {0}")]
    UnknownDefinition(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<CoreError> for OrchestratorError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::MissingRequiredInput(key) => Self::MissingRequiredInput(key),
            CoreError::LandingZoneNotFound(id) => Self::LandingZoneNotFound(id),
            other => Self::Core(other),
        }
    }
}

impl OrchestratorError {
    pub fn sub_operation_failed(flight_id: Uuid, reason: impl Into<String>) -> Self {
        Self::SubOperationFailed {
            flight_id,
            reason: reason.into(),
        }
    }

    /// Whether a step hitting this error should be retried.
    ///
    /// Only provider-side transient failures and database contention qualify;
    /// everything else means the request itself cannot succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Cloud(e) => e.is_retryable(),
            Self::Database(db::DbError::Sqlx(_)) => true,
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Cloud(e) if e.is_not_found())
    }
}

fn format_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;
