use thiserror::Error;

/// Protocol-wide error types for the Hypha incentive engine.
///
/// Every rejected operation maps to exactly one variant. No variant implies
/// partial application: callers may retry once the condition is fixed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HyphaError {
    /// Malformed or missing input (bad address, empty evidence, stake below minimum).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation not legal in the current lifecycle state.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Caller lacks the required role (admin, reviewer, oracle, node operator).
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Called before (or after) the relevant time window.
    #[error("Timing error: {0}")]
    Timing(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Signature or key material error.
    #[error("Crypto error: {0}")]
    Crypto(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl HyphaError {
    /// Short machine-readable category, used in RPC error envelopes and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            HyphaError::Validation(_) => "validation",
            HyphaError::InvalidState(_) => "invalid_state",
            HyphaError::Unauthorized(_) => "unauthorized",
            HyphaError::Timing(_) => "timing",
            HyphaError::NotFound(_) => "not_found",
            HyphaError::Crypto(_) => "crypto",
            HyphaError::Serialization(_) => "serialization",
        }
    }
}

impl From<serde_json::Error> for HyphaError {
    fn from(e: serde_json::Error) -> Self {
        HyphaError::Serialization(e.to_string())
    }
}

impl From<ed25519_dalek::SignatureError> for HyphaError {
    fn from(e: ed25519_dalek::SignatureError) -> Self {
        HyphaError::Crypto(e.to_string())
    }
}
