//! Key material: vault master key and per-owner capsule keys.
//!
//! The master key is derived from the vault passphrase with Argon2id (file
//! vaults) or drawn from the OS RNG (in-memory vaults). Capsule keys are never
//! stored: each owner's key is derived from the master key and the owner's
//! address whenever a capsule is sealed or opened.

use argon2::Argon2;
use serde::{Deserialize, Serialize};
use zeroize::ZeroizeOnDrop;

use crate::error::{CapsuleError, Result};
use crate::identity::BtcAddress;

use super::random_bytes;

/// Length of derived keys in bytes (256 bits).
pub const KEY_LENGTH: usize = 32;

/// Minimum salt length accepted by [`derive_master_key`].
pub const MIN_SALT_LENGTH: usize = 16;

/// Domain separation string for owner keys.
const OWNER_KEY_CONTEXT: &str = "capsule-vault 2026-01 owner capsule key v1";

/// Argon2id cost parameters.
///
/// Defaults follow RFC 9106's second recommendation: 64 MiB, 3 passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 64 * 1024,
            iterations: 3,
            parallelism: 1,
        }
    }
}

/// The vault-wide secret every owner key is derived from.
///
/// Zeroized from memory on drop.
#[derive(Clone, ZeroizeOnDrop)]
pub struct MasterKey {
    key: [u8; KEY_LENGTH],
}

impl MasterKey {
    /// Draw a fresh random master key.
    pub fn generate() -> Result<Self> {
        Ok(Self {
            key: random_bytes::<KEY_LENGTH>()?,
        })
    }

    /// Wrap existing key bytes.
    ///
    /// # Security
    ///
    /// The caller is responsible for ensuring the bytes come from a secure source.
    pub fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self { key: bytes }
    }

    /// Derive the capsule key for one owner.
    pub fn owner_key(&self, owner: &BtcAddress) -> OwnerKey {
        let mut hasher = blake3::Hasher::new_derive_key(OWNER_KEY_CONTEXT);
        hasher.update(&self.key);
        hasher.update(owner.as_str().as_bytes());
        OwnerKey {
            key: *hasher.finalize().as_bytes(),
        }
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Symmetric key bound to a single owner address.
#[derive(ZeroizeOnDrop)]
pub struct OwnerKey {
    key: [u8; KEY_LENGTH],
}

impl OwnerKey {
    /// Raw key bytes.
    ///
    /// Avoid storing or logging this value. Use only for immediate encryption operations.
    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl std::fmt::Debug for OwnerKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwnerKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Derive the vault master key from a passphrase using Argon2id.
///
/// # Arguments
///
/// * `passphrase` - The vault passphrase
/// * `salt` - Per-vault random salt (stored in vault metadata)
/// * `params` - Cost parameters recorded when the vault was created
///
/// # Security
///
/// - Same passphrase + salt + params always produces the same key
/// - Memory-hard: resistant to GPU attacks at the default parameters
pub fn derive_master_key(passphrase: &str, salt: &[u8], params: &KdfParams) -> Result<MasterKey> {
    if passphrase.is_empty() {
        return Err(CapsuleError::InvalidInput(
            "Passphrase cannot be empty".to_string(),
        ));
    }

    if salt.len() < MIN_SALT_LENGTH {
        return Err(CapsuleError::InvalidInput(format!(
            "Salt must be at least {} bytes",
            MIN_SALT_LENGTH
        )));
    }

    let argon_params = argon2::Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(KEY_LENGTH),
    )
    .map_err(|e| CapsuleError::Crypto(format!("Failed to create Argon2 params: {}", e)))?;

    let argon2 = Argon2::new(
        argon2::Algorithm::Argon2id,
        argon2::Version::V0x13,
        argon_params,
    );

    let mut key_bytes = [0u8; KEY_LENGTH];
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, &mut key_bytes)
        .map_err(|e| CapsuleError::Crypto(format!("Key derivation failed: {}", e)))?;

    Ok(MasterKey::from_bytes(key_bytes))
}
