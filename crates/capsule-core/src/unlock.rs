//! Unlock engine: sealing, opening, and the unlock decision rules.
//!
//! The engine holds no capsule state. It decides whether a transition is
//! permitted; the caller records it through storage.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::capsule::{Capsule, CapsuleId, UnlockMethod, UnlockRecord};
use crate::crypto::{self, MasterKey, Plaintext, SealedPayload};
use crate::error::{CapsuleError, Result};
use crate::identity::BtcAddress;

/// How many distinct trusted guardians must attest to an emergency unlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuorumPolicy {
    /// More than half of the trusted guardians.
    #[default]
    Majority,
    /// Every trusted guardian.
    All,
    /// A fixed count, clamped to the number of trusted guardians.
    AtLeast { count: usize },
}

impl QuorumPolicy {
    /// Attestations needed when `registered` guardians are trusted.
    ///
    /// Never less than 1.
    pub fn required(self, registered: usize) -> usize {
        match self {
            QuorumPolicy::Majority => registered / 2 + 1,
            QuorumPolicy::All => registered.max(1),
            QuorumPolicy::AtLeast { count } => count.max(1).min(registered.max(1)),
        }
    }
}

/// Guardian quorum for one owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuorumStatus {
    pub registered: usize,
    pub required: usize,
    pub policy: QuorumPolicy,
}

/// Outcome of evaluating an unlock request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlockDecision {
    /// The capsule is already open; return its plaintext unchanged.
    AlreadyUnlocked,
    /// Record this transition, then open.
    Permit(UnlockRecord),
}

pub struct UnlockEngine {
    master: MasterKey,
    quorum: QuorumPolicy,
}

impl UnlockEngine {
    pub fn new(master: MasterKey, quorum: QuorumPolicy) -> Self {
        Self { master, quorum }
    }

    pub fn quorum(&self) -> QuorumPolicy {
        self.quorum
    }

    pub fn quorum_status(&self, registered: usize) -> QuorumStatus {
        QuorumStatus {
            registered,
            required: self.quorum.required(registered),
            policy: self.quorum,
        }
    }

    /// Seal a message for the capsule the owner will receive at `id`.
    pub fn seal(&self, owner: &BtcAddress, id: CapsuleId, message: &[u8]) -> Result<SealedPayload> {
        let key = self.master.owner_key(owner);
        crypto::seal(&key, &associated_data(owner, id), message)
    }

    /// Decrypt a capsule's payload.
    ///
    /// # Errors
    ///
    /// Returns `CapsuleError::Invariant` if the payload fails authentication:
    /// the ciphertext, its owner, or its index was altered.
    pub fn open(&self, capsule: &Capsule) -> Result<Plaintext> {
        let key = self.master.owner_key(&capsule.owner);
        crypto::open(&key, &associated_data(&capsule.owner, capsule.id), &capsule.sealed)
    }

    /// Time-lock rule: permitted once `now` reaches the unlock time.
    pub fn evaluate_time(&self, capsule: &Capsule, now: DateTime<Utc>) -> Result<UnlockDecision> {
        if capsule.unlocked.is_some() {
            return Ok(UnlockDecision::AlreadyUnlocked);
        }
        if !capsule.is_time_unlockable(now) {
            return Err(CapsuleError::NotYetUnlockable {
                id: capsule.id,
                unlock_time: capsule.unlock_time,
            });
        }
        Ok(UnlockDecision::Permit(UnlockRecord {
            unlocked_at: now,
            method: UnlockMethod::TimeLock,
            attestations: Vec::new(),
        }))
    }

    /// Quorum rule: every attester must be trusted, and the distinct
    /// attesters must reach the policy threshold for `trusted`.
    ///
    /// The time lock is not consulted. An already unlocked capsule still
    /// needs a full quorum; only then is it reported as `AlreadyUnlocked`.
    pub fn evaluate_quorum(
        &self,
        capsule: &Capsule,
        trusted: &[BtcAddress],
        attesters: &[BtcAddress],
        now: DateTime<Utc>,
    ) -> Result<UnlockDecision> {
        if trusted.is_empty() {
            return Err(CapsuleError::NoGuardiansConfigured);
        }

        let mut distinct = BTreeSet::new();
        for attester in attesters {
            if !trusted.contains(attester) {
                return Err(CapsuleError::InvalidGuardian(format!(
                    "{} is not a trusted guardian of {}",
                    attester, capsule.owner
                )));
            }
            distinct.insert(attester.clone());
        }

        let required = self.quorum.required(trusted.len());
        debug!(
            owner = %capsule.owner,
            capsule = %capsule.id,
            attested = distinct.len(),
            required,
            "quorum evaluated"
        );
        if distinct.len() < required {
            return Err(CapsuleError::QuorumNotMet {
                attested: distinct.len(),
                required,
            });
        }
        if capsule.unlocked.is_some() {
            return Ok(UnlockDecision::AlreadyUnlocked);
        }

        Ok(UnlockDecision::Permit(UnlockRecord {
            unlocked_at: now,
            method: UnlockMethod::GuardianQuorum,
            attestations: distinct.into_iter().collect(),
        }))
    }

    /// Unconditional unlock for test harnesses.
    #[cfg(any(test, feature = "test-support"))]
    pub fn forced(&self, capsule: &Capsule, now: DateTime<Utc>) -> UnlockDecision {
        if capsule.unlocked.is_some() {
            return UnlockDecision::AlreadyUnlocked;
        }
        UnlockDecision::Permit(UnlockRecord {
            unlocked_at: now,
            method: UnlockMethod::Forced,
            attestations: Vec::new(),
        })
    }
}

/// Binds a payload to its owner and index.
fn associated_data(owner: &BtcAddress, id: CapsuleId) -> Vec<u8> {
    let mut aad = Vec::with_capacity(owner.as_str().len() + 4);
    aad.extend_from_slice(owner.as_str().as_bytes());
    aad.extend_from_slice(&id.index().to_be_bytes());
    aad
}
