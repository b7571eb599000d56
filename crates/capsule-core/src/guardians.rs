//! Guardian registry: the addresses an owner trusts to attest to an
//! emergency unlock.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::error::{CapsuleError, Result};
use crate::identity::BtcAddress;
use crate::storage::StorageEngine;

/// Human-readable confirmation of a completed change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ack {
    pub message: String,
}

impl Ack {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Guardian operations for the owners of one storage engine.
pub struct GuardianRegistry<'a, S: StorageEngine + ?Sized> {
    storage: &'a S,
}

impl<'a, S: StorageEngine + ?Sized> GuardianRegistry<'a, S> {
    pub fn new(storage: &'a S) -> Self {
        Self { storage }
    }

    /// Trust `guardian` on behalf of `owner`.
    ///
    /// # Errors
    ///
    /// Returns `CapsuleError::InvalidGuardian` for a self-loop and
    /// `CapsuleError::DuplicateGuardian` if the guardian is already trusted.
    pub fn add(
        &self,
        owner: &BtcAddress,
        guardian: &BtcAddress,
        now: DateTime<Utc>,
    ) -> Result<Ack> {
        if owner == guardian {
            return Err(CapsuleError::InvalidGuardian(
                "An owner cannot be their own guardian".to_string(),
            ));
        }
        self.storage.insert_guardian(owner, guardian, now)?;
        info!(owner = %owner, guardian = %guardian, "guardian added");
        Ok(Ack::new(format!("Guardian {} added", guardian)))
    }

    /// Revoke trust in `guardian`.
    pub fn remove(&self, owner: &BtcAddress, guardian: &BtcAddress) -> Result<Ack> {
        if !self.storage.revoke_guardian(owner, guardian)? {
            return Err(CapsuleError::NotFound(format!(
                "{} is not a guardian",
                guardian
            )));
        }
        info!(owner = %owner, guardian = %guardian, "guardian removed");
        Ok(Ack::new(format!("Guardian {} removed", guardian)))
    }

    /// Trusted guardians in the order they were added.
    pub fn trusted(&self, owner: &BtcAddress) -> Result<Vec<BtcAddress>> {
        Ok(self
            .storage
            .list_guardians(owner)?
            .into_iter()
            .filter(|guardian| guardian.trusted)
            .map(|guardian| guardian.address)
            .collect())
    }

    pub fn is_trusted(&self, owner: &BtcAddress, candidate: &BtcAddress) -> Result<bool> {
        Ok(self.trusted(owner)?.contains(candidate))
    }
}
