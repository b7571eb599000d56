//! Vault passphrase rules, checked when a vault is created.

use crate::error::{CapsuleError, Result};

/// Fewest characters a vault passphrase may have.
pub const MIN_PASSPHRASE_CHARS: usize = 8;

/// Reject blank passphrases and ones shorter than [`MIN_PASSPHRASE_CHARS`].
///
/// Length is counted in characters, not bytes.
///
/// ```
/// use capsule_core::crypto::validate_passphrase;
///
/// assert!(validate_passphrase("correct horse battery").is_ok());
/// assert!(validate_passphrase("hunter2").is_err());
/// ```
pub fn validate_passphrase(passphrase: &str) -> Result<()> {
    let chars = passphrase.chars().count();
    match chars {
        _ if passphrase.trim().is_empty() => Err(CapsuleError::InvalidInput(
            "Vault passphrase cannot be blank".to_string(),
        )),
        n if n < MIN_PASSPHRASE_CHARS => Err(CapsuleError::InvalidInput(format!(
            "Vault passphrase must be at least {} characters (got {})",
            MIN_PASSPHRASE_CHARS, n
        ))),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_long_enough() {
        assert!(validate_passphrase("12345678").is_ok());
        assert!(validate_passphrase("a sentence works too!").is_ok());
    }

    #[test]
    fn test_rejects_short() {
        let err = validate_passphrase("1234567").unwrap_err();
        assert!(err.to_string().contains("at least 8 characters"));
        assert!(matches!(err, CapsuleError::InvalidInput(_)));
    }

    #[test]
    fn test_rejects_blank() {
        for blank in ["", "        ", "\n\t\n\t\n\t\n\t"] {
            assert!(validate_passphrase(blank).unwrap_err().to_string().contains("blank"));
        }
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        assert!(validate_passphrase("ééééééé").is_err());
        assert!(validate_passphrase("éééééééé").is_ok());
    }
}
