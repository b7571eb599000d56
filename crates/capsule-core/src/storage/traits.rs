//! Storage engine trait definition.
//!
//! The `StorageEngine` trait defines the interface every backend implements:
//! the in-memory engine used by library callers and tests, and the
//! age-encrypted SQLite vault used by the CLI.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::types::{Guardian, VaultMetadata};
use crate::capsule::{Capsule, CapsuleId, UnlockRecord};
use crate::error::Result;
use crate::identity::{BtcAddress, Challenge};

/// Storage engine interface for capsule vaults.
///
/// All implementations must ensure:
/// - Capsules are append-only; only `record_unlock` mutates one, and only once
/// - Capsule indices are dense and 0-based per owner
/// - `record_unlock` and `consume_challenges` are atomic
///
/// Every method takes `&self`; engines serialize access internally.
pub trait StorageEngine: Send + Sync {
    /// Get vault metadata.
    fn metadata(&self) -> Result<VaultMetadata>;

    // --- Capsule operations ---

    /// The index the owner's next capsule will receive.
    fn next_capsule_id(&self, owner: &BtcAddress) -> Result<CapsuleId>;

    /// Append a new, locked capsule.
    ///
    /// # Errors
    ///
    /// Returns `CapsuleError::Invariant` if the capsule is already unlocked or
    /// its index is not the owner's next index.
    fn insert_capsule(&self, capsule: &Capsule) -> Result<()>;

    /// Get one of the owner's capsules.
    ///
    /// # Returns
    ///
    /// Returns `Ok(None)` if the owner has no capsule with that index.
    fn get_capsule(&self, owner: &BtcAddress, id: CapsuleId) -> Result<Option<Capsule>>;

    /// List the owner's capsules in creation order.
    fn list_capsules(&self, owner: &BtcAddress) -> Result<Vec<Capsule>>;

    /// Flip a capsule from locked to unlocked and spend the challenges that
    /// authorized it, in one transaction.
    ///
    /// # Returns
    ///
    /// Returns `Ok(false)` without changing anything if the capsule was
    /// already unlocked.
    ///
    /// # Errors
    ///
    /// Returns `CapsuleError::NotFound` if the capsule does not exist and
    /// `VerificationFailure::ReplayedChallenge` if any challenge was already
    /// spent; nothing is written in either case.
    fn record_unlock(
        &self,
        owner: &BtcAddress,
        id: CapsuleId,
        record: &UnlockRecord,
        spent_challenges: &[Uuid],
    ) -> Result<bool>;

    // --- Guardian operations ---

    /// Register a guardian, or restore trust in a revoked one.
    ///
    /// # Errors
    ///
    /// Returns `CapsuleError::DuplicateGuardian` if the guardian is already
    /// trusted.
    fn insert_guardian(
        &self,
        owner: &BtcAddress,
        guardian: &BtcAddress,
        added_at: DateTime<Utc>,
    ) -> Result<()>;

    /// All guardian records for the owner, trusted or not, in insertion order.
    fn list_guardians(&self, owner: &BtcAddress) -> Result<Vec<Guardian>>;

    /// Revoke trust in a guardian.
    ///
    /// # Returns
    ///
    /// Returns `Ok(false)` if the address was not a trusted guardian.
    fn revoke_guardian(&self, owner: &BtcAddress, guardian: &BtcAddress) -> Result<bool>;

    // --- Challenge operations ---

    /// Record an issued challenge.
    fn insert_challenge(&self, challenge: &Challenge) -> Result<()>;

    /// Get a challenge by ID.
    fn get_challenge(&self, id: &Uuid) -> Result<Option<Challenge>>;

    /// Mark challenges as spent, all or none.
    ///
    /// # Errors
    ///
    /// Returns `VerificationFailure::ReplayedChallenge` if any challenge is
    /// already spent, and `VerificationFailure::UnknownChallenge` if any is
    /// missing.
    fn consume_challenges(&self, ids: &[Uuid], at: DateTime<Utc>) -> Result<()>;

    /// Delete challenges that expired before `cutoff`.
    ///
    /// # Returns
    ///
    /// Returns the number of challenges removed.
    fn prune_challenges(&self, cutoff: DateTime<Utc>) -> Result<usize>;

    // --- Maintenance operations ---

    /// Check vault integrity.
    ///
    /// Verifies:
    /// - Capsule indices are dense per owner
    /// - Status and unlock fields agree
    /// - No guardian self-loops
    /// - Required metadata is present
    fn check_integrity(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trait_is_object_safe() {
        fn _accepts_dyn(_engine: &dyn StorageEngine) {}
    }
}
