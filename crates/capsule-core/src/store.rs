//! Capsule store: per-owner capsule collections over a storage engine.

use chrono::{DateTime, Utc};
use tracing::info;

use crate::capsule::{Capsule, CapsuleId, UnlockDelay, UnlockRecord};
use crate::crypto::SealedPayload;
use crate::error::{CapsuleError, Result};
use crate::identity::BtcAddress;
use crate::storage::StorageEngine;

pub struct CapsuleStore<'a, S: StorageEngine + ?Sized> {
    storage: &'a S,
}

impl<'a, S: StorageEngine + ?Sized> CapsuleStore<'a, S> {
    pub fn new(storage: &'a S) -> Self {
        Self { storage }
    }

    /// Index the owner's next capsule will get. Stable only while the
    /// caller holds the owner's write lock.
    pub fn next_id(&self, owner: &BtcAddress) -> Result<CapsuleId> {
        self.storage.next_capsule_id(owner)
    }

    /// Store a sealed payload as a new locked capsule at `id`.
    pub fn create(
        &self,
        owner: &BtcAddress,
        id: CapsuleId,
        sealed: SealedPayload,
        unlock_delay: UnlockDelay,
        now: DateTime<Utc>,
    ) -> Result<Capsule> {
        let capsule = Capsule {
            owner: owner.clone(),
            id,
            sealed,
            created_at: now,
            unlock_delay,
            unlock_time: now + unlock_delay.duration(),
            unlocked: None,
        };
        self.storage.insert_capsule(&capsule)?;

        info!(
            owner = %owner,
            capsule = %id,
            unlock_time = %capsule.unlock_time,
            "capsule created"
        );
        Ok(capsule)
    }

    pub fn list(&self, owner: &BtcAddress) -> Result<Vec<Capsule>> {
        self.storage.list_capsules(owner)
    }

    /// # Errors
    ///
    /// Returns `CapsuleError::NotFound` if the owner has no capsule `id`.
    pub fn get(&self, owner: &BtcAddress, id: CapsuleId) -> Result<Capsule> {
        self.storage
            .get_capsule(owner, id)?
            .ok_or_else(|| CapsuleError::NotFound(format!("Capsule {}", id)))
    }

    /// Record the `Locked -> Unlocked` transition and spend the challenges
    /// that authorized it.
    ///
    /// Returns false if another caller unlocked the capsule first.
    pub fn mark_unlocked(
        &self,
        owner: &BtcAddress,
        id: CapsuleId,
        record: &UnlockRecord,
        spent_challenges: &[uuid::Uuid],
    ) -> Result<bool> {
        let recorded = self
            .storage
            .record_unlock(owner, id, record, spent_challenges)?;
        if recorded {
            info!(
                owner = %owner,
                capsule = %id,
                method = record.method.as_str(),
                "capsule unlocked"
            );
        }
        Ok(recorded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capsule::{CapsuleStatus, UnlockMethod};
    use crate::config::ChainNetwork;
    use crate::storage::MemoryStorage;
    use crate::test_support::TestWallet;

    fn sealed() -> SealedPayload {
        SealedPayload {
            nonce: [1u8; 12],
            ciphertext: vec![1, 2, 3],
        }
    }

    #[test]
    fn test_create_sets_unlock_time_and_dense_ids() {
        let storage = MemoryStorage::new();
        let store = CapsuleStore::new(&storage);
        let owner = TestWallet::new(1).address(ChainNetwork::Bitcoin);
        let now = Utc::now();

        for expected in 0..3 {
            let id = store.next_id(&owner).unwrap();
            assert_eq!(id, CapsuleId::new(expected));
            let capsule = store
                .create(&owner, id, sealed(), UnlockDelay::SevenDays, now)
                .unwrap();
            assert_eq!(capsule.unlock_time, now + chrono::Duration::days(7));
            assert_eq!(capsule.status(), CapsuleStatus::Locked);
        }

        let ids: Vec<_> = store.list(&owner).unwrap().iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![CapsuleId::new(0), CapsuleId::new(1), CapsuleId::new(2)]);
    }

    #[test]
    fn test_get_other_owner_is_not_found() {
        let storage = MemoryStorage::new();
        let store = CapsuleStore::new(&storage);
        let alice = TestWallet::new(1).address(ChainNetwork::Bitcoin);
        let bob = TestWallet::new(2).address(ChainNetwork::Bitcoin);
        store
            .create(&alice, CapsuleId::new(0), sealed(), UnlockDelay::OneDay, Utc::now())
            .unwrap();

        assert!(matches!(
            store.get(&bob, CapsuleId::new(0)),
            Err(CapsuleError::NotFound(_))
        ));
    }

    #[test]
    fn test_mark_unlocked_once() {
        let storage = MemoryStorage::new();
        let store = CapsuleStore::new(&storage);
        let owner = TestWallet::new(1).address(ChainNetwork::Bitcoin);
        let now = Utc::now();
        store
            .create(&owner, CapsuleId::new(0), sealed(), UnlockDelay::OneDay, now)
            .unwrap();
        let record = UnlockRecord {
            unlocked_at: now,
            method: UnlockMethod::TimeLock,
            attestations: Vec::new(),
        };

        assert!(store.mark_unlocked(&owner, CapsuleId::new(0), &record, &[]).unwrap());
        assert!(!store.mark_unlocked(&owner, CapsuleId::new(0), &record, &[]).unwrap());
    }
}
