// src/error.rs
//! Error taxonomy for the Access Grant engine.
//!
//! Local validation errors (request shape, scope, missing fields) are deterministic
//! and must never be retried. Only the `*Unavailable` variants describe a remote
//! collaborator that failed, and callers own any retry policy for those.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type used across the crate.
pub type AccessResult<T> = Result<T, AccessError>;

/// Every failure the engine can report.
///
/// The enum only carries owned, comparable data so it can be stored inside a
/// [`Verification`](crate::services::verifier::Verification) and compared in tests.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    /// A request descriptor failed local validation.
    #[error("invalid access request: `{field}` {reason}")]
    InvalidRequestShape { field: String, reason: String },

    /// A redirect URL did not carry a usable credential reference.
    #[error("malformed handoff: {0}")]
    MalformedHandoff(String),

    /// A redirect was attempted without a caller-supplied callback.
    #[error("a redirect callback is required outside an interactive environment")]
    MissingRedirectCallback,

    /// The access request could not be resolved, or was already decided the other way.
    #[error("unknown access request: {0}")]
    UnknownRequest(String),

    /// Overrides (or the issued grant) go beyond what was requested.
    #[error("scope exceeds the access request: {0}")]
    ScopeExceedsRequest(String),

    /// The signing/issuing collaborator failed.
    #[error("issuer unavailable: {0}")]
    IssuerUnavailable(String),

    /// The remote proof verifier could not be reached.
    #[error("verifier unavailable: {0}")]
    VerifierUnavailable(String),

    /// The status list host could not be reached or returned an unusable list.
    #[error("status list unavailable: {0}")]
    StatusListUnavailable(String),

    #[error("credential expired at {expired_at}")]
    Expired { expired_at: DateTime<Utc> },

    #[error("credential is not valid before {valid_from}")]
    NotYetValid { valid_from: DateTime<Utc> },

    #[error("credential has been revoked")]
    Revoked,

    /// The remote verifier rejected the proof; the reason is its own, verbatim.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// The credential variant structurally lacks the requested field.
    #[error("credential has no `{0}` field")]
    MissingField(&'static str),

    /// The credential is not well-formed, or is not the expected variant.
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    /// No management agent was discovered and no fallback was supplied.
    #[error("no access management agent found for {0}")]
    ManagementAgentNotFound(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl AccessError {
    /// Shorthand for [`AccessError::InvalidRequestShape`].
    pub fn shape(field: impl Into<String>, reason: impl Into<String>) -> Self {
        AccessError::InvalidRequestShape {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// True for remote-unavailability errors, the only ones a caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AccessError::IssuerUnavailable(_)
                | AccessError::VerifierUnavailable(_)
                | AccessError::StatusListUnavailable(_)
        )
    }
}

impl From<config::ConfigError> for AccessError {
    fn from(err: config::ConfigError) -> Self {
        AccessError::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_unavailable_errors_are_retryable() {
        assert!(AccessError::IssuerUnavailable("down".into()).is_retryable());
        assert!(AccessError::VerifierUnavailable("timeout".into()).is_retryable());
        assert!(AccessError::StatusListUnavailable("404".into()).is_retryable());

        assert!(!AccessError::Revoked.is_retryable());
        assert!(!AccessError::ScopeExceedsRequest("write".into()).is_retryable());
        assert!(!AccessError::shape("resources", "must not be empty").is_retryable());
        assert!(!AccessError::MissingField("access").is_retryable());
    }

    #[test]
    fn test_shape_error_names_the_field() {
        let err = AccessError::shape("expirationDate", "must be in the future");
        assert_eq!(
            err.to_string(),
            "invalid access request: `expirationDate` must be in the future"
        );
    }
}
