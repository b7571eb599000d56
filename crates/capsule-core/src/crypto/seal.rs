//! Capsule payload sealing with ChaCha20-Poly1305.

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{CapsuleError, Result};

use super::key::OwnerKey;
use super::random_bytes;

/// ChaCha20-Poly1305 nonce length.
pub const NONCE_LEN: usize = 12;

/// Decrypted capsule contents, wiped from memory on drop.
pub type Plaintext = Zeroizing<Vec<u8>>;

/// Nonce plus authenticated ciphertext as stored in the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedPayload {
    pub nonce: [u8; NONCE_LEN],
    pub ciphertext: Vec<u8>,
}

/// Encrypt `plaintext` under `key`, binding `aad` into the tag.
pub fn seal(key: &OwnerKey, aad: &[u8], plaintext: &[u8]) -> Result<SealedPayload> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    let nonce = random_bytes::<NONCE_LEN>()?;
    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| CapsuleError::Crypto(format!("Sealing failed: {}", e)))?;

    Ok(SealedPayload { nonce, ciphertext })
}

/// Decrypt a sealed payload.
///
/// A tag mismatch means the key, the binding data, or the stored bytes are
/// wrong. That is never a caller error, so it surfaces as
/// [`CapsuleError::Invariant`].
pub fn open(key: &OwnerKey, aad: &[u8], sealed: &SealedPayload) -> Result<Plaintext> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    cipher
        .decrypt(
            Nonce::from_slice(&sealed.nonce),
            Payload {
                msg: &sealed.ciphertext,
                aad,
            },
        )
        .map(Zeroizing::new)
        .map_err(|_| CapsuleError::Invariant("capsule payload failed authentication".to_string()))
}
