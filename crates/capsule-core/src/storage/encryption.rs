//! Whole-vault file encryption with age.
//!
//! The serialized SQLite image is wrapped with age's passphrase recipient
//! (scrypt). Capsule payloads inside the image are sealed separately under
//! keys derived from the Argon2id master key, so a decrypted vault image
//! still does not expose capsule plaintext.

use std::io::{Read, Write};
use std::iter;

use age::secrecy::SecretString;

use zeroize::Zeroizing;

use crate::error::{CapsuleError, Result};

/// Encrypt a serialized vault image for writing to disk.
pub fn encrypt(data: &[u8], passphrase: &str) -> Result<Vec<u8>> {
    let encryptor =
        age::Encryptor::with_user_passphrase(SecretString::from(passphrase.to_string()));

    let mut encrypted = Vec::new();
    let mut writer = encryptor
        .wrap_output(&mut encrypted)
        .map_err(|e| CapsuleError::Crypto(format!("Failed to create encryptor: {}", e)))?;

    writer
        .write_all(data)
        .map_err(|e| CapsuleError::Crypto(format!("Encryption write failed: {}", e)))?;

    writer
        .finish()
        .map_err(|e| CapsuleError::Crypto(format!("Encryption finish failed: {}", e)))?;

    Ok(encrypted)
}

/// Decrypt a vault file read from disk.
///
/// # Errors
///
/// Returns `CapsuleError::IncorrectPassphrase` when no recipient stanza
/// opens with the passphrase, and `CapsuleError::Crypto` when the file is
/// not an age file or is truncated or corrupted.
pub fn decrypt(encrypted_data: &[u8], passphrase: &str) -> Result<Zeroizing<Vec<u8>>> {
    let decryptor = age::Decryptor::new(encrypted_data)
        .map_err(|e| CapsuleError::Crypto(format!("Failed to create decryptor: {}", e)))?;

    let mut decrypted = Zeroizing::new(Vec::new());

    let identity = age::scrypt::Identity::new(SecretString::from(passphrase.to_string()));
    let mut reader = decryptor
        .decrypt(iter::once(&identity as &dyn age::Identity))
        .map_err(|e| match e {
            age::DecryptError::NoMatchingKeys
            | age::DecryptError::DecryptionFailed
            | age::DecryptError::KeyDecryptionFailed => CapsuleError::IncorrectPassphrase,
            _ => CapsuleError::Crypto(format!("Decryption failed: {}", e)),
        })?;

    reader
        .read_to_end(&mut decrypted)
        .map_err(|e| CapsuleError::Crypto(format!("Failed to read decrypted data: {}", e)))?;

    Ok(decrypted)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PASSPHRASE: &str = "vault-passphrase-123";

    #[test]
    fn test_vault_image_round_trip() {
        let image = b"SQLite format 3\0 pretend page data";

        let encrypted = encrypt(image, PASSPHRASE).unwrap();
        assert_ne!(encrypted.as_slice(), image.as_slice());

        let decrypted = decrypt(&encrypted, PASSPHRASE).unwrap();
        assert_eq!(decrypted.as_slice(), image);
    }

    #[test]
    fn test_wrong_passphrase_reported_as_such() {
        let encrypted = encrypt(b"image", PASSPHRASE).unwrap();
        let result = decrypt(&encrypted, "another-passphrase-456");
        assert!(matches!(result, Err(CapsuleError::IncorrectPassphrase)));
    }

    #[test]
    fn test_corrupted_file_fails() {
        let mut encrypted = encrypt(b"image", PASSPHRASE).unwrap();
        let last = encrypted.len() - 1;
        encrypted[last] ^= 0xFF;
        assert!(decrypt(&encrypted, PASSPHRASE).is_err());
    }

    #[test]
    fn test_not_an_age_file() {
        let result = decrypt(b"plain text vault", PASSPHRASE);
        assert!(matches!(result, Err(CapsuleError::Crypto(_))));
    }
}
