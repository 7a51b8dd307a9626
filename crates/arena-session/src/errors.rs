//! Session error types.

use thiserror::Error;

/// Errors raised while decoding session tokens.
///
/// Any of these is fatal for session construction: a session is never built
/// from a token whose expiry cannot be established.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SessionError {
    /// The token is not a three-segment `header.claims.signature` string.
    #[error("malformed token: {reason}")]
    MalformedToken {
        /// What was wrong with the token shape.
        reason: String,
    },

    /// The claims segment is not valid base64url.
    #[error("token claims are not valid base64url: {0}")]
    Base64(String),

    /// The decoded claims segment is not a JSON object.
    #[error("token claims are not a JSON object: {0}")]
    Claims(String),

    /// A required claim is absent.
    #[error("token is missing required claim `{0}`")]
    MissingClaim(&'static str),

    /// A claim is present but has the wrong type.
    #[error("invalid `{claim}` claim: {reason}")]
    InvalidClaim {
        /// Claim name.
        claim: &'static str,
        /// What was wrong with the value.
        reason: String,
    },
}

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
