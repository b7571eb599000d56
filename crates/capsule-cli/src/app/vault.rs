//! An open vault and the service running over it.

use std::path::Path;

use capsule_core::identity::VerifiedIdentity;
use capsule_core::{AgeSqliteStorage, CapsuleError, CapsuleService, VaultConfig};
use tracing::{debug, warn};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::cli::OwnerProof;
use crate::errors::CliError;

use super::passphrase::open_storage_with_retry;

pub struct Vault {
    service: CapsuleService<AgeSqliteStorage>,
    passphrase: Zeroizing<String>,
}

impl Vault {
    /// Decrypt the vault and derive its master key.
    pub fn open(path: &Path, policy: VaultConfig, no_input: bool) -> anyhow::Result<Self> {
        let (storage, passphrase) = open_storage_with_retry(path, no_input)?;
        let master = storage.master_key(&passphrase).map_err(CliError::from)?;
        Ok(Self {
            service: CapsuleService::new(storage, master, policy),
            passphrase,
        })
    }

    pub fn service(&self) -> &CapsuleService<AgeSqliteStorage> {
        &self.service
    }

    /// Verify a signed session challenge.
    ///
    /// The session lives until this process exits.
    pub fn login(&self, proof: &OwnerProof) -> Result<VerifiedIdentity, CliError> {
        let (Some(address), Some(challenge), Some(signature)) = (
            proof.address.as_deref(),
            proof.challenge.as_deref(),
            proof.signature.as_deref(),
        ) else {
            return Err(CapsuleError::NotAuthenticated.into());
        };
        let challenge_id = Uuid::parse_str(challenge.trim()).map_err(|_| {
            CliError::invalid_input(format!("Invalid challenge id: {}", challenge))
        })?;
        let identity = self
            .service
            .verify_ownership(address, &challenge_id, signature)?;
        debug!(address = %identity.address(), "session opened");
        Ok(identity)
    }

    /// Persist the vault, then hand back the command's result.
    ///
    /// The vault is written even when the command failed, so a challenge
    /// spent on a failed command stays spent.
    pub fn finish<T>(self, result: anyhow::Result<T>) -> anyhow::Result<T> {
        settle(result, self.close())
    }

    /// Encrypt and write the vault back to disk.
    pub fn close(self) -> anyhow::Result<()> {
        let Vault {
            service,
            passphrase,
        } = self;
        service
            .into_storage()
            .close(&passphrase)
            .map_err(CliError::from)?;
        Ok(())
    }
}

/// The command's error wins; a save failure behind it is logged, not lost.
fn settle<T>(result: anyhow::Result<T>, closed: anyhow::Result<()>) -> anyhow::Result<T> {
    match (result, closed) {
        (Ok(value), closed) => closed.map(|()| value),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(close_err)) => {
            warn!(
                error = %close_err,
                "vault not saved after failed command; spent challenges were not persisted"
            );
            Err(err)
        }
    }
}
