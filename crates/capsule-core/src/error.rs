//! Error types for capsule core operations.
//!
//! Errors are descriptive at the core level; the CLI layer maps them to
//! exit codes and user-facing hints using [`CapsuleError::class`].

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::capsule::CapsuleId;

/// Result type alias for capsule operations.
pub type Result<T> = std::result::Result<T, CapsuleError>;

/// Why an ownership proof was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerificationFailure {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    #[error("signature does not match address")]
    SignatureMismatch,

    #[error("unknown challenge")]
    UnknownChallenge,

    #[error("challenge expired")]
    ExpiredChallenge,

    #[error("challenge already used")]
    ReplayedChallenge,

    #[error("challenge was issued for a different address")]
    AddressMismatch,

    #[error("challenge was issued for a different purpose")]
    PurposeMismatch,

    #[error("challenge supplied more than once")]
    DuplicateChallenge,
}

/// Coarse classification used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Fatal to the current call; never retried automatically.
    Authentication,
    /// Expected steady-state outcome; retry later.
    PolicyPending,
    /// Caller mistake; resubmit with changes.
    Input,
    /// Invariant violation or backend failure.
    Fatal,
}

impl ErrorClass {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorClass::Authentication => "authentication",
            ErrorClass::PolicyPending => "policy_pending",
            ErrorClass::Input => "input",
            ErrorClass::Fatal => "fatal",
        }
    }
}

/// Core error type for capsule operations.
#[derive(Debug, Error)]
pub enum CapsuleError {
    /// Ownership proof rejected
    #[error("Verification failed: {0}")]
    Verification(VerificationFailure),

    /// No valid session for the caller
    #[error("Not authenticated: verify ownership of your address first")]
    NotAuthenticated,

    /// Authenticated, but not allowed to act on this owner's capsules
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Incorrect passphrase during vault decryption
    #[error("Incorrect passphrase")]
    IncorrectPassphrase,

    /// Time lock has not elapsed yet
    #[error("Capsule {id} is locked until {unlock_time}")]
    NotYetUnlockable {
        id: CapsuleId,
        unlock_time: DateTime<Utc>,
    },

    /// Not enough distinct guardian attestations
    #[error("Guardian quorum not met: {attested} of {required} required attestations")]
    QuorumNotMet { attested: usize, required: usize },

    /// Owner has no trusted guardians registered
    #[error("No guardians configured for this owner")]
    NoGuardiansConfigured,

    /// Guardian address rejected
    #[error("Invalid guardian: {0}")]
    InvalidGuardian(String),

    /// Guardian already registered
    #[error("Guardian already registered: {0}")]
    DuplicateGuardian(String),

    /// Invalid user input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Vault file not found
    #[error("Vault file not found")]
    VaultNotFound,

    /// Test-mode operation requested while test mode is off
    #[error("Test mode is disabled for this vault")]
    TestModeDisabled,

    /// Encryption or decryption error
    #[error("Encryption error: {0}")]
    Crypto(String),

    /// A stored record violates a core invariant
    #[error("Invariant violated: {0}")]
    Invariant(String),

    /// Storage backend error (generic)
    #[error("Storage error: {0}")]
    Storage(String),

    /// SQLite-specific storage error
    #[error("SQLite error: {source}")]
    Sqlite {
        #[from]
        source: rusqlite::Error,
    },

    /// I/O error
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

impl From<VerificationFailure> for CapsuleError {
    fn from(failure: VerificationFailure) -> Self {
        CapsuleError::Verification(failure)
    }
}

impl CapsuleError {
    /// Classify the error for retry and reporting decisions.
    pub fn class(&self) -> ErrorClass {
        match self {
            CapsuleError::Verification(_)
            | CapsuleError::NotAuthenticated
            | CapsuleError::Unauthorized(_)
            | CapsuleError::IncorrectPassphrase => ErrorClass::Authentication,
            CapsuleError::NotYetUnlockable { .. } | CapsuleError::QuorumNotMet { .. } => {
                ErrorClass::PolicyPending
            }
            CapsuleError::NoGuardiansConfigured
            | CapsuleError::InvalidGuardian(_)
            | CapsuleError::DuplicateGuardian(_)
            | CapsuleError::InvalidInput(_)
            | CapsuleError::NotFound(_)
            | CapsuleError::VaultNotFound
            | CapsuleError::TestModeDisabled => ErrorClass::Input,
            CapsuleError::Crypto(_)
            | CapsuleError::Invariant(_)
            | CapsuleError::Storage(_)
            | CapsuleError::Sqlite { .. }
            | CapsuleError::Io { .. }
            | CapsuleError::Json { .. } => ErrorClass::Fatal,
        }
    }

    /// Whether the same request may succeed later without changes.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::PolicyPending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_errors_are_retryable() {
        let err = CapsuleError::QuorumNotMet {
            attested: 1,
            required: 2,
        };
        assert!(err.is_retryable());
        assert_eq!(err.class(), ErrorClass::PolicyPending);
    }

    #[test]
    fn test_authentication_errors_are_not_retryable() {
        let err: CapsuleError = VerificationFailure::ReplayedChallenge.into();
        assert_eq!(err.class(), ErrorClass::Authentication);
        assert!(!err.is_retryable());
        assert!(!CapsuleError::NotAuthenticated.is_retryable());
    }

    #[test]
    fn test_display_includes_detail() {
        let err = CapsuleError::QuorumNotMet {
            attested: 1,
            required: 3,
        };
        assert_eq!(
            err.to_string(),
            "Guardian quorum not met: 1 of 3 required attestations"
        );
    }
}
