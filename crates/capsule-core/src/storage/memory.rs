//! In-memory storage engine.
//!
//! Lives for the lifetime of the process. Useful for embedding the service
//! and for tests; nothing is written to disk.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::capsule::{Capsule, CapsuleId, UnlockRecord};
use crate::error::{CapsuleError, Result, VerificationFailure};
use crate::identity::{BtcAddress, Challenge};
use crate::storage::traits::StorageEngine;
use crate::storage::types::{Guardian, VaultMetadata};

#[derive(Default)]
struct Tables {
    capsules: HashMap<BtcAddress, Vec<Capsule>>,
    guardians: HashMap<BtcAddress, Vec<Guardian>>,
    challenges: HashMap<Uuid, Challenge>,
    last_modified: Option<DateTime<Utc>>,
}

pub struct MemoryStorage {
    vault_id: Uuid,
    created_at: DateTime<Utc>,
    tables: RwLock<Tables>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            vault_id: Uuid::new_v4(),
            created_at: Utc::now(),
            tables: RwLock::new(Tables::default()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

fn next_index(capsules: Option<&Vec<Capsule>>) -> Result<CapsuleId> {
    let count = capsules.map_or(0, Vec::len);
    u32::try_from(count)
        .map(CapsuleId::new)
        .map_err(|_| CapsuleError::InvalidInput("Owner has too many capsules".to_string()))
}

fn check_spendable(challenges: &HashMap<Uuid, Challenge>, ids: &[Uuid]) -> Result<()> {
    for id in ids {
        match challenges.get(id) {
            None => return Err(VerificationFailure::UnknownChallenge.into()),
            Some(challenge) if challenge.is_consumed() => {
                return Err(VerificationFailure::ReplayedChallenge.into())
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn spend(challenges: &mut HashMap<Uuid, Challenge>, ids: &[Uuid], at: DateTime<Utc>) {
    for id in ids {
        if let Some(challenge) = challenges.get_mut(id) {
            challenge.consumed_at = Some(at);
        }
    }
}

impl StorageEngine for MemoryStorage {
    fn metadata(&self) -> Result<VaultMetadata> {
        let tables = self.read();
        Ok(VaultMetadata {
            format_version: "memory".to_string(),
            vault_id: self.vault_id,
            created_at: self.created_at,
            last_modified: tables.last_modified.unwrap_or(self.created_at),
        })
    }

    fn next_capsule_id(&self, owner: &BtcAddress) -> Result<CapsuleId> {
        next_index(self.read().capsules.get(owner))
    }

    fn insert_capsule(&self, capsule: &Capsule) -> Result<()> {
        if capsule.unlocked.is_some() {
            return Err(CapsuleError::Invariant(
                "New capsules must be locked".to_string(),
            ));
        }

        let mut tables = self.write();
        let expected = next_index(tables.capsules.get(&capsule.owner))?;
        if capsule.id != expected {
            return Err(CapsuleError::Invariant(format!(
                "Capsule index {} out of sequence (expected {})",
                capsule.id, expected
            )));
        }

        tables
            .capsules
            .entry(capsule.owner.clone())
            .or_default()
            .push(capsule.clone());
        tables.last_modified = Some(Utc::now());
        Ok(())
    }

    fn get_capsule(&self, owner: &BtcAddress, id: CapsuleId) -> Result<Option<Capsule>> {
        Ok(self
            .read()
            .capsules
            .get(owner)
            .and_then(|list| list.get(id.index() as usize))
            .cloned())
    }

    fn list_capsules(&self, owner: &BtcAddress) -> Result<Vec<Capsule>> {
        Ok(self.read().capsules.get(owner).cloned().unwrap_or_default())
    }

    fn record_unlock(
        &self,
        owner: &BtcAddress,
        id: CapsuleId,
        record: &UnlockRecord,
        spent_challenges: &[Uuid],
    ) -> Result<bool> {
        let mut tables = self.write();
        let tables = &mut *tables;

        let capsule = tables
            .capsules
            .get_mut(owner)
            .and_then(|list| list.get_mut(id.index() as usize))
            .ok_or_else(|| CapsuleError::NotFound(format!("Capsule {}", id)))?;
        if capsule.unlocked.is_some() {
            return Ok(false);
        }

        check_spendable(&tables.challenges, spent_challenges)?;
        spend(&mut tables.challenges, spent_challenges, record.unlocked_at);
        capsule.unlocked = Some(record.clone());
        tables.last_modified = Some(Utc::now());
        Ok(true)
    }

    fn insert_guardian(
        &self,
        owner: &BtcAddress,
        guardian: &BtcAddress,
        added_at: DateTime<Utc>,
    ) -> Result<()> {
        if owner == guardian {
            return Err(CapsuleError::InvalidGuardian(
                "An owner cannot be their own guardian".to_string(),
            ));
        }

        let mut tables = self.write();
        let list = tables.guardians.entry(owner.clone()).or_default();
        match list.iter_mut().find(|g| &g.address == guardian) {
            Some(existing) if existing.trusted => {
                return Err(CapsuleError::DuplicateGuardian(guardian.to_string()))
            }
            Some(existing) => existing.trusted = true,
            None => list.push(Guardian {
                address: guardian.clone(),
                trusted: true,
                added_at,
            }),
        }
        tables.last_modified = Some(Utc::now());
        Ok(())
    }

    fn list_guardians(&self, owner: &BtcAddress) -> Result<Vec<Guardian>> {
        Ok(self.read().guardians.get(owner).cloned().unwrap_or_default())
    }

    fn revoke_guardian(&self, owner: &BtcAddress, guardian: &BtcAddress) -> Result<bool> {
        let mut tables = self.write();
        let revoked = tables
            .guardians
            .get_mut(owner)
            .and_then(|list| list.iter_mut().find(|g| &g.address == guardian && g.trusted))
            .map(|g| g.trusted = false)
            .is_some();
        if revoked {
            tables.last_modified = Some(Utc::now());
        }
        Ok(revoked)
    }

    fn insert_challenge(&self, challenge: &Challenge) -> Result<()> {
        let mut tables = self.write();
        if tables.challenges.contains_key(&challenge.id) {
            return Err(CapsuleError::Invariant(format!(
                "Challenge {} already exists",
                challenge.id
            )));
        }
        tables.challenges.insert(challenge.id, challenge.clone());
        Ok(())
    }

    fn get_challenge(&self, id: &Uuid) -> Result<Option<Challenge>> {
        Ok(self.read().challenges.get(id).cloned())
    }

    fn consume_challenges(&self, ids: &[Uuid], at: DateTime<Utc>) -> Result<()> {
        let mut tables = self.write();
        check_spendable(&tables.challenges, ids)?;
        spend(&mut tables.challenges, ids, at);
        Ok(())
    }

    fn prune_challenges(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut tables = self.write();
        let before = tables.challenges.len();
        tables.challenges.retain(|_, c| c.expires_at >= cutoff);
        Ok(before - tables.challenges.len())
    }

    fn check_integrity(&self) -> Result<()> {
        let tables = self.read();

        for (owner, capsules) in &tables.capsules {
            for (position, capsule) in capsules.iter().enumerate() {
                if capsule.id.index() as usize != position || &capsule.owner != owner {
                    return Err(CapsuleError::Invariant(format!(
                        "Capsule {} of {} is out of place",
                        capsule.id, owner
                    )));
                }
            }
        }

        for (owner, guardians) in &tables.guardians {
            if guardians.iter().any(|g| &g.address == owner) {
                return Err(CapsuleError::Invariant(format!(
                    "{} is registered as their own guardian",
                    owner
                )));
            }
        }

        Ok(())
    }
}
