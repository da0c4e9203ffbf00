//! Error types for Pulse.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PulseError {
    /// Missing or placeholder provider settings, unknown threshold kinds.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The APM provider failed, timed out or answered with garbage.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Malformed inbound request.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Bad or missing webhook secret.
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PulseError {
    /// HTTP status code used when this error reaches an HTTP caller.
    pub fn status_code(&self) -> u16 {
        match self {
            PulseError::Validation(_) => 400,
            PulseError::Unauthorized => 401,
            PulseError::Upstream(_) => 502,
            PulseError::Configuration(_)
            | PulseError::Internal(_)
            | PulseError::Json(_) => 500,
        }
    }

    /// Short reason safe to show to a client. Upstream and internal details
    /// stay in the logs.
    pub fn public_reason(&self) -> String {
        match self {
            PulseError::Validation(reason) => reason.clone(),
            PulseError::Unauthorized => "Unauthorized".to_string(),
            PulseError::Upstream(_) => "Monitoring provider unavailable".to_string(),
            _ => "Internal error".to_string(),
        }
    }
}

pub type PulseResult<T> = Result<T, PulseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(PulseError::Validation("x".into()).status_code(), 400);
        assert_eq!(PulseError::Unauthorized.status_code(), 401);
        assert_eq!(PulseError::Internal("x".into()).status_code(), 500);
    }

    #[test]
    fn test_public_reason_hides_upstream_detail() {
        let err = PulseError::Upstream("GET https://tenant/api/v2/entities: 503".into());
        assert!(!err.public_reason().contains("tenant"));
        assert_eq!(
            PulseError::Validation("Message is required".into()).public_reason(),
            "Message is required"
        );
    }
}
