//! Error taxonomy for the lab library
//!
//! Parameter and lookup failures are fatal to the call that raised them.
//! NRDB unavailability is recoverable: the cost estimator falls back to the
//! static layer and the validator records affected hosts as failed.

use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by library operations
#[derive(Debug, Error)]
pub enum LabError {
    /// Caller supplied an out-of-range or malformed input
    #[error("invalid parameter `{field}`: {reason}")]
    InvalidParameter { field: &'static str, reason: String },

    /// Requested preset or template does not exist
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// NRDB access failed (recoverable at estimator/validator boundaries)
    #[error(transparent)]
    Nrdb(#[from] NrdbError),

    /// Non-host-specific rollout precondition failure
    #[error("rollout failed: {0}")]
    Rollout(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl LabError {
    /// Shorthand for parameter validation failures
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            field,
            reason: reason.into(),
        }
    }
}

/// Typed errors from the NRDB query interface
#[derive(Debug, Error)]
pub enum NrdbError {
    #[error("authentication rejected by NRDB: {0}")]
    Auth(String),

    #[error("NRDB query timed out after {0:?}")]
    Timeout(Duration),

    #[error("NRDB rate limit exceeded")]
    RateLimit,

    #[error("malformed NRDB response: {0}")]
    MalformedResponse(String),

    #[error("circuit breaker open, retry in {retry_in:?}")]
    CircuitOpen { retry_in: Duration },

    #[error("NRDB request failed: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, LabError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_parameter_names_field() {
        let err = LabError::invalid("sample_rate", "must be in [20, 300] or -1");
        assert!(err.to_string().contains("sample_rate"));
        assert!(err.to_string().contains("[20, 300]"));
    }

    #[test]
    fn test_nrdb_error_converts_to_lab_error() {
        let err: LabError = NrdbError::RateLimit.into();
        assert!(matches!(err, LabError::Nrdb(NrdbError::RateLimit)));
    }
}
