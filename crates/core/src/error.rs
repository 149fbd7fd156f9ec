use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Missing required input: {0}")]
    MissingRequiredInput(String),

    #[error("Value under '{key}' has an unexpected shape: {source}")]
    InvalidValue {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Landing zone not found: {0}")]
    LandingZoneNotFound(Uuid),

    #[error("Invalid flight status transition from {from} to {to}")]
    InvalidStatusTransition { from: String, to: String },

    #[error("Validation error: {0}")]
    Validation(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let id = Uuid::new_v4();
        let error = CoreError::LandingZoneNotFound(id);
        assert!(error.to_string().contains(&id.to_string()));

        let error = CoreError::MissingRequiredInput("VNET_RESOURCES".to_string());
        assert_eq!(error.to_string(), "Missing required input: VNET_RESOURCES");
    }
}
