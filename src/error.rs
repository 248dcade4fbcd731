//! Unified error types for the relay core
//!
//! Every failure kind stays distinguishable: authorization, envelope and
//! network failures need different corrective action from the caller
//! (re-sign, re-fetch fees, re-submit).

use serde::{Deserialize, Serialize};

/// Main error type for all relay operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    /// Malformed input to the canonical codec
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Malformed private key or signing failure
    #[error("Signing error: {0}")]
    Signing(String),

    /// Signature components out of range or unrecoverable
    #[error("Recovery error: {0}")]
    Recovery(String),

    /// Self-verification after signing an authorization did not match
    #[error("Authorization integrity error: expected authority {expected}, recovered {recovered}")]
    AuthorizationIntegrity { expected: String, recovered: String },

    /// Missing or out-of-range envelope field
    #[error("Validation error: {0}")]
    Validation(String),

    /// Node rejection or transport failure while broadcasting
    #[error("Broadcast failed: {0}")]
    Broadcast(String),

    /// Nonce, fee or gas lookup failed
    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RelayError {
    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }

    pub fn signing(msg: impl Into<String>) -> Self {
        Self::Signing(msg.into())
    }

    pub fn recovery(msg: impl Into<String>) -> Self {
        Self::Recovery(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn broadcast(msg: impl Into<String>) -> Self {
        Self::Broadcast(msg.into())
    }

    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Machine-readable category of this error
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Encoding(_) => ErrorCode::EncodingError,
            Self::Signing(_) => ErrorCode::SigningError,
            Self::Recovery(_) => ErrorCode::RecoveryError,
            Self::AuthorizationIntegrity { .. } => ErrorCode::AuthorizationIntegrityError,
            Self::Validation(_) => ErrorCode::ValidationError,
            Self::Broadcast(_) => ErrorCode::BroadcastError,
            Self::Provider(_) => ErrorCode::ProviderError,
            Self::Config(_) => ErrorCode::ConfigError,
        }
    }

    /// Only read-only chain-state lookups may be retried.
    ///
    /// Broadcast failures are never retryable here: the payload is nonce-bound
    /// and resubmission semantics belong to the network.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Provider(_))
    }
}

/// Error codes for categorization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    EncodingError,
    SigningError,
    RecoveryError,
    AuthorizationIntegrityError,
    ValidationError,
    BroadcastError,
    ProviderError,
    ConfigError,
}

/// JSON shape used when an error crosses a process boundary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

impl From<&RelayError> for ErrorBody {
    fn from(e: &RelayError) -> Self {
        Self {
            code: e.code(),
            message: e.to_string(),
        }
    }
}

/// Result type alias for relay operations
pub type RelayResult<T> = Result<T, RelayError>;

impl From<hex::FromHexError> for RelayError {
    fn from(e: hex::FromHexError) -> Self {
        RelayError::Validation(format!("Invalid hex: {}", e))
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        RelayError::Config(e.to_string())
    }
}

impl From<std::io::Error> for RelayError {
    fn from(e: std::io::Error) -> Self {
        RelayError::Config(e.to_string())
    }
}
