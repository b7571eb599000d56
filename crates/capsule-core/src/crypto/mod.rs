//! Cryptographic operations for capsule vaults.
//!
//! - **Age**: whole-vault file encryption (see `storage::encryption`)
//! - **Argon2id**: passphrase to master key derivation
//! - **BLAKE3**: per-owner key derivation from the master key
//! - **ChaCha20-Poly1305**: capsule payload sealing
//!
//! ## Threat Model
//!
//! We defend against:
//! - Theft of the encrypted vault file
//! - Disclosure of one owner's capsules under another owner's key
//! - Tampering with stored ciphertext (detected, never returned)
//!
//! We do NOT defend against:
//! - Compromised OS / keylogger
//! - An operator who holds both the vault file and its passphrase

pub mod key;
pub mod passphrase;
pub mod seal;

pub use key::{derive_master_key, KdfParams, MasterKey, OwnerKey};
pub use passphrase::validate_passphrase;
pub use seal::{open, seal, Plaintext, SealedPayload};

use crate::error::{CapsuleError, Result};

/// Fill an array from the OS random number generator.
pub fn random_bytes<const N: usize>() -> Result<[u8; N]> {
    let mut bytes = [0u8; N];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| CapsuleError::Crypto(format!("Failed to gather randomness: {}", e)))?;
    Ok(bytes)
}
