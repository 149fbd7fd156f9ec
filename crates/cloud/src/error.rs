//! Provider error classification
//!
//! Every provider failure is mapped onto a small set of categories so the
//! flight engine can decide between retry, adopt and fail.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum CloudError {
    /// Resource does not exist (safe to treat as already deleted)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Resource already exists (create steps adopt it)
    #[error("Resource already exists: {0}")]
    Conflict(String),

    /// Network failure, throttling or a 5xx response
    #[error("Transient provider failure: {message}")]
    Transient {
        status: Option<u16>,
        message: String,
    },

    /// Provider refused the request for a reason retrying will not fix
    #[error("Request rejected ({status}): {message}")]
    Rejected {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

impl CloudError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CloudError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, CloudError::Conflict(_))
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, CloudError::Transient { .. })
    }

    pub fn transient(message: impl Into<String>) -> Self {
        CloudError::Transient {
            status: None,
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for CloudError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            CloudError::InvalidResponse(e.to_string())
        } else {
            CloudError::Transient {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;

const NOT_FOUND_CODES: &[&str] = &["ResourceNotFound", "ResourceGroupNotFound", "NotFound"];

const CONFLICT_CODES: &[&str] = &["ResourceAlreadyExists", "AlreadyExists", "Conflict"];

/// Codes that come back as 409 but clear up on their own
const BUSY_CODES: &[&str] = &[
    "AnotherOperationInProgress",
    "RetryableError",
    "ServerBusy",
    "TooManyRequests",
];

/// Classify a failed provider response from its HTTP status and error code.
pub fn classify_provider_error(
    status: u16,
    code: Option<&str>,
    message: Option<&str>,
    resource_id: &str,
) -> CloudError {
    let message = message.unwrap_or("Unknown error").to_string();

    match (status, code) {
        (_, Some(c)) if BUSY_CODES.contains(&c) => CloudError::Transient {
            status: Some(status),
            message,
        },
        (404, _) => CloudError::NotFound(resource_id.to_string()),
        (_, Some(c)) if NOT_FOUND_CODES.contains(&c) => CloudError::NotFound(resource_id.to_string()),
        (409 | 412, _) => CloudError::Conflict(resource_id.to_string()),
        (_, Some(c)) if CONFLICT_CODES.contains(&c) => CloudError::Conflict(resource_id.to_string()),
        (408 | 429, _) | (500..=599, _) => CloudError::Transient {
            status: Some(status),
            message,
        },
        _ => CloudError::Rejected {
            status,
            code: code.map(|c| c.to_string()),
            message,
        },
    }
}
