//! CLI error types for structured error handling.
//!
//! This module provides typed errors that map to specific exit codes,
//! enabling consistent error handling across the CLI.

use std::fmt;

use capsule_core::{CapsuleError, ErrorClass};

/// CLI-specific errors with associated exit codes.
#[derive(Debug)]
pub enum CliError {
    /// Resource not found (config, vault, capsule)
    NotFound { message: String, hint: String },

    /// Authentication failed (wrong passphrase, rejected proof, no session)
    AuthFailed {
        message: String,
        hint: Option<String>,
    },

    /// Invalid user input
    InvalidInput {
        message: String,
        hint: Option<String>,
    },

    /// Stored data failed verification
    IntegrityFailed(String),

    /// Not permitted yet; the same command may succeed later
    Pending { message: String, hint: String },
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::NotFound { message, hint } | CliError::Pending { message, hint } => {
                write!(f, "{}\n{}", message, hint)
            }
            CliError::AuthFailed { message, hint } | CliError::InvalidInput { message, hint } => {
                if let Some(h) = hint {
                    write!(f, "{}\n{}", message, h)
                } else {
                    write!(f, "{}", message)
                }
            }
            CliError::IntegrityFailed(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for CliError {}

impl CliError {
    /// Create a NotFound error with message and hint.
    pub fn not_found(message: impl Into<String>, hint: impl Into<String>) -> Self {
        CliError::NotFound {
            message: message.into(),
            hint: hint.into(),
        }
    }

    /// Create an AuthFailed error with message and optional hint.
    pub fn auth_failed(message: impl Into<String>) -> Self {
        CliError::AuthFailed {
            message: message.into(),
            hint: None,
        }
    }

    /// Create an AuthFailed error with message and hint.
    pub fn auth_failed_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        CliError::AuthFailed {
            message: message.into(),
            hint: Some(hint.into()),
        }
    }

    /// Create an InvalidInput error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        CliError::InvalidInput {
            message: message.into(),
            hint: None,
        }
    }

    pub fn integrity_failed(message: impl Into<String>) -> Self {
        CliError::IntegrityFailed(message.into())
    }

    /// Get the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        use super::constants::exit_codes;
        match self {
            CliError::NotFound { .. } => exit_codes::NOT_FOUND,
            CliError::AuthFailed { .. } => exit_codes::AUTH_FAILED,
            CliError::InvalidInput { .. } => exit_codes::INVALID_INPUT,
            CliError::IntegrityFailed(_) => exit_codes::INTEGRITY_FAILED,
            CliError::Pending { .. } => exit_codes::PENDING,
        }
    }

    /// Print error message to stderr and exit with appropriate code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);
        std::process::exit(self.exit_code())
    }
}

impl From<CapsuleError> for CliError {
    fn from(err: CapsuleError) -> Self {
        let message = err.to_string();
        match &err {
            CapsuleError::NotFound(_) => {
                CliError::not_found(message, "Hint: Run `capsule list` to see your capsules.")
            }
            CapsuleError::VaultNotFound => {
                CliError::not_found(message, "Hint: Run `capsule init` to create a vault.")
            }
            CapsuleError::IncorrectPassphrase => CliError::auth_failed("Incorrect passphrase."),
            CapsuleError::NotAuthenticated => CliError::auth_failed_with_hint(
                message,
                "Hint: Run `capsule challenge <address>`, sign the message, then pass\n      --address, --challenge and --signature.",
            ),
            CapsuleError::NotYetUnlockable { .. } => CliError::Pending {
                message,
                hint: "Hint: Try again after the unlock time, or ask your guardians for an emergency unlock.".to_string(),
            },
            CapsuleError::QuorumNotMet { .. } => CliError::Pending {
                message,
                hint: "Hint: Collect attestations from more of the owner's guardians.".to_string(),
            },
            CapsuleError::NoGuardiansConfigured => CliError::InvalidInput {
                message,
                hint: Some("Hint: The owner must run `capsule guardian add` first.".to_string()),
            },
            CapsuleError::Invariant(_) => CliError::integrity_failed(message),
            _ => match err.class() {
                ErrorClass::Authentication => CliError::auth_failed(message),
                ErrorClass::Input => CliError::invalid_input(message),
                ErrorClass::PolicyPending => CliError::Pending {
                    message,
                    hint: "Hint: Try again later.".to_string(),
                },
                ErrorClass::Fatal => CliError::integrity_failed(message),
            },
        }
    }
}
