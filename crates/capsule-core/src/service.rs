//! Capsule service: the operations callers use.
//!
//! Composes the identity verifier, session registry, guardian registry,
//! capsule store and unlock engine. Every owner-scoped operation resolves a
//! session token first. Writes for one owner are serialized by a per-owner
//! lock; reads and signature checks run outside it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::capsule::{
    validate_delay, validate_message, Capsule, CapsuleId, CapsuleReceipt, CapsuleSummary,
    UnlockDelay, UnlockMethod, UnlockRecord,
};
use crate::clock::{Clock, SystemClock};
use crate::config::VaultConfig;
use crate::crypto::{MasterKey, Plaintext};
use crate::error::{CapsuleError, Result};
use crate::guardians::{Ack, GuardianRegistry};
use crate::identity::{
    Attestation, BitcoinMessageScheme, BtcAddress, Challenge, IdentityStatus, IdentityVerifier,
    ProofPurpose, SessionRegistry, SessionToken, SignatureScheme, VerifiedIdentity,
};
use crate::storage::StorageEngine;
use crate::store::CapsuleStore;
use crate::unlock::{QuorumStatus, UnlockDecision, UnlockEngine};

/// One mutex per owner address, created on first use.
#[derive(Default)]
struct OwnerLocks {
    locks: Mutex<HashMap<BtcAddress, Arc<Mutex<()>>>>,
}

impl OwnerLocks {
    fn handle(&self, owner: &BtcAddress) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(owner.clone()).or_default())
    }
}

pub struct CapsuleService<S: StorageEngine> {
    storage: S,
    config: VaultConfig,
    verifier: IdentityVerifier,
    sessions: SessionRegistry,
    engine: UnlockEngine,
    clock: Arc<dyn Clock>,
    locks: OwnerLocks,
}

impl<S: StorageEngine> CapsuleService<S> {
    /// Build a service over `storage`, sealing capsules under `master`.
    pub fn new(storage: S, master: MasterKey, config: VaultConfig) -> Self {
        Self {
            verifier: IdentityVerifier::new(
                config.network,
                config.challenge_ttl(),
                Box::new(BitcoinMessageScheme::new()),
            ),
            sessions: SessionRegistry::new(config.session_ttl()),
            engine: UnlockEngine::new(master, config.quorum),
            clock: Arc::new(SystemClock),
            locks: OwnerLocks::default(),
            storage,
            config,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_scheme(mut self, scheme: Box<dyn SignatureScheme>) -> Self {
        self.verifier =
            IdentityVerifier::new(self.config.network, self.config.challenge_ttl(), scheme);
        self
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Tear down the service, ending every session.
    pub fn into_storage(self) -> S {
        self.storage
    }

    /// Validate an address for this vault's network.
    pub fn parse_address(&self, raw: &str) -> Result<BtcAddress> {
        self.verifier.parse_address(raw)
    }

    // --- Identity ---

    /// Issue a challenge for `address` to sign.
    pub fn issue_challenge(&self, address: &str, purpose: ProofPurpose) -> Result<Challenge> {
        let now = self.clock.now();
        let address = self.verifier.parse_address(address)?;
        self.verifier
            .issue_challenge(&self.storage, &address, purpose, now)
    }

    /// Check a signed session challenge and open a session.
    pub fn verify_ownership(
        &self,
        address: &str,
        challenge_id: &Uuid,
        signature: &str,
    ) -> Result<VerifiedIdentity> {
        let now = self.clock.now();
        let address = self.verifier.parse_address(address)?;
        self.verifier.verify(
            &self.storage,
            &self.sessions,
            &address,
            challenge_id,
            signature,
            now,
        )
    }

    /// End a session. Returns false if it was not live.
    pub fn end_session(&self, token: &SessionToken) -> bool {
        self.sessions.end(token)
    }

    pub fn identity_status(&self, token: Option<&SessionToken>) -> IdentityStatus {
        self.sessions.status(token, self.clock.now())
    }

    // --- Capsules ---

    /// Seal `message` into a new capsule for the session's owner.
    ///
    /// # Errors
    ///
    /// Returns `CapsuleError::InvalidInput` for an empty or oversized message,
    /// or a custom delay the vault does not allow. Nothing is stored on error.
    pub fn create_capsule(
        &self,
        token: &SessionToken,
        message: &[u8],
        delay: UnlockDelay,
    ) -> Result<CapsuleReceipt> {
        let now = self.clock.now();
        let identity = self.sessions.resolve(Some(token), now)?;
        validate_message(message, self.config.max_message_bytes)?;
        validate_delay(delay, self.config.allow_custom_delays)?;

        let owner = identity.address();
        let store = CapsuleStore::new(&self.storage);
        let lock = self.locks.handle(owner);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let id = store.next_id(owner)?;
        let sealed = self.engine.seal(owner, id, message)?;
        let capsule = store.create(owner, id, sealed, delay, now)?;
        Ok(CapsuleReceipt::new(&capsule))
    }

    /// The session owner's capsules in creation order, without payloads.
    pub fn list_capsules(&self, token: &SessionToken) -> Result<Vec<CapsuleSummary>> {
        let identity = self.sessions.resolve(Some(token), self.clock.now())?;
        Ok(CapsuleStore::new(&self.storage)
            .list(identity.address())?
            .iter()
            .map(Capsule::summary)
            .collect())
    }

    /// Open one of the session owner's capsules once its time lock elapses.
    ///
    /// Unlocked capsules return their plaintext again without re-checking
    /// the clock.
    pub fn unlock_capsule(&self, token: &SessionToken, id: CapsuleId) -> Result<Plaintext> {
        let now = self.clock.now();
        let identity = self.sessions.resolve(Some(token), now)?;
        let owner = identity.address();
        let store = CapsuleStore::new(&self.storage);

        let lock = self.locks.handle(owner);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let capsule = store.get(owner, id)?;
        let decision = self.engine.evaluate_time(&capsule, now).inspect_err(|e| {
            debug!(owner = %owner, capsule = %id, error = %e, "time unlock refused")
        })?;
        self.apply(&store, &capsule, decision, &[])
    }

    // --- Guardians ---

    pub fn add_guardian(&self, token: &SessionToken, guardian: &str) -> Result<Ack> {
        let now = self.clock.now();
        let identity = self.sessions.resolve(Some(token), now)?;
        let guardian = self.guardian_address(guardian)?;
        let owner = identity.address();

        let lock = self.locks.handle(owner);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        GuardianRegistry::new(&self.storage).add(owner, &guardian, now)
    }

    pub fn remove_guardian(&self, token: &SessionToken, guardian: &str) -> Result<Ack> {
        let identity = self.sessions.resolve(Some(token), self.clock.now())?;
        let guardian = self.guardian_address(guardian)?;
        let owner = identity.address();

        let lock = self.locks.handle(owner);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        GuardianRegistry::new(&self.storage).remove(owner, &guardian)
    }

    /// Trusted guardians of the session owner, in the order they were added.
    pub fn list_guardians(&self, token: &SessionToken) -> Result<Vec<BtcAddress>> {
        let identity = self.sessions.resolve(Some(token), self.clock.now())?;
        GuardianRegistry::new(&self.storage).trusted(identity.address())
    }

    /// Registered guardians and the attestations an emergency unlock needs.
    ///
    /// Defaults to the session owner when `owner` is `None`.
    pub fn quorum_status(&self, token: &SessionToken, owner: Option<&str>) -> Result<QuorumStatus> {
        let identity = self.sessions.resolve(Some(token), self.clock.now())?;
        let owner = match owner {
            Some(raw) => self.verifier.parse_address(raw)?,
            None => identity.address().clone(),
        };
        let registered = GuardianRegistry::new(&self.storage).trusted(&owner)?.len();
        Ok(self.engine.quorum_status(registered))
    }

    /// Emergency unlock on the strength of guardian attestations.
    ///
    /// The requester must be the owner or one of the owner's trusted
    /// guardians. Attestations are verified before the owner lock is taken
    /// and spent in the same write that unlocks the capsule; on any failure
    /// none of them are spent.
    pub fn guardian_unlock(
        &self,
        token: &SessionToken,
        owner: &str,
        id: CapsuleId,
        attestations: &[Attestation],
    ) -> Result<Plaintext> {
        let now = self.clock.now();
        let requester = self.sessions.resolve(Some(token), now)?;
        let owner = self.verifier.parse_address(owner)?;
        let guardians = GuardianRegistry::new(&self.storage);
        let store = CapsuleStore::new(&self.storage);

        if requester.address() != &owner && !guardians.is_trusted(&owner, requester.address())? {
            warn!(requester = %requester.address(), owner = %owner, "emergency unlock refused");
            return Err(CapsuleError::Unauthorized(format!(
                "{} is not the owner or a guardian of {}",
                requester.address(),
                owner
            )));
        }

        let capsule = store.get(&owner, id)?;
        if let Some(record) = capsule.unlocked.as_ref() {
            if may_reopen(record, &owner, requester.address()) {
                return self.engine.open(&capsule);
            }
        }
        if guardians.trusted(&owner)?.is_empty() {
            return Err(CapsuleError::NoGuardiansConfigured);
        }

        let purpose = ProofPurpose::EmergencyUnlock {
            owner: owner.clone(),
            capsule: id,
        };
        let verified = self
            .verifier
            .verify_attestations(&self.storage, &purpose, attestations, now)?;

        let lock = self.locks.handle(&owner);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        // Trust may have changed while the signatures were checked.
        let capsule = store.get(&owner, id)?;
        let trusted = guardians.trusted(&owner)?;
        let decision = self
            .engine
            .evaluate_quorum(&capsule, &trusted, &verified.guardians, now)
            .inspect_err(|e| {
                debug!(owner = %owner, capsule = %id, error = %e, "emergency unlock refused")
            })?;
        if decision == UnlockDecision::AlreadyUnlocked {
            // No transition to record, but the quorum's attestations are spent.
            self.storage.consume_challenges(&verified.challenges, now)?;
        }
        self.apply(&store, &capsule, decision, &verified.challenges)
    }

    /// Hand out the test-mode capability when the vault enables it.
    #[cfg(any(test, feature = "test-support"))]
    pub fn test_mode(&self) -> Result<TestMode<'_, S>> {
        if !self.config.test_mode {
            return Err(CapsuleError::TestModeDisabled);
        }
        warn!("test mode enabled; unlock policy can be bypassed");
        Ok(TestMode { service: self })
    }

    fn guardian_address(&self, raw: &str) -> Result<BtcAddress> {
        self.verifier
            .parse_address(raw)
            .map_err(|e| CapsuleError::InvalidGuardian(e.to_string()))
    }

    /// Open the capsule and, if the decision permits a transition, record it.
    ///
    /// Opening first means a payload that fails authentication never
    /// changes status.
    fn apply(
        &self,
        store: &CapsuleStore<'_, S>,
        capsule: &Capsule,
        decision: UnlockDecision,
        spent_challenges: &[Uuid],
    ) -> Result<Plaintext> {
        let plaintext = self.engine.open(capsule)?;
        if let UnlockDecision::Permit(record) = decision {
            self.record(store, capsule, &record, spent_challenges)?;
        }
        Ok(plaintext)
    }

    fn record(
        &self,
        store: &CapsuleStore<'_, S>,
        capsule: &Capsule,
        record: &UnlockRecord,
        spent_challenges: &[Uuid],
    ) -> Result<()> {
        if !store.mark_unlocked(&capsule.owner, capsule.id, record, spent_challenges)? {
            debug!(owner = %capsule.owner, capsule = %capsule.id, "capsule already unlocked");
        }
        Ok(())
    }
}

/// Whether a requester may re-read an unlocked capsule without a new quorum:
/// the owner always, a guardian only if it attested to the recorded unlock.
fn may_reopen(record: &UnlockRecord, owner: &BtcAddress, requester: &BtcAddress) -> bool {
    requester == owner
        || (record.method == UnlockMethod::GuardianQuorum && record.attestations.contains(requester))
}

/// Policy bypass for test harnesses.
///
/// Only compiled for tests or with the `test-support` feature, and only
/// obtainable from [`CapsuleService::test_mode`] when the vault config sets
/// `test_mode`.
#[cfg(any(test, feature = "test-support"))]
pub struct TestMode<'a, S: StorageEngine> {
    service: &'a CapsuleService<S>,
}

#[cfg(any(test, feature = "test-support"))]
impl<S: StorageEngine> TestMode<'_, S> {
    /// Unlock one of the session owner's capsules regardless of time or
    /// quorum. Recorded with method `Forced`.
    pub fn force_unlock(&self, token: &SessionToken, id: CapsuleId) -> Result<Plaintext> {
        let service = self.service;
        let now = service.clock.now();
        let identity = service.sessions.resolve(Some(token), now)?;
        let owner = identity.address();
        let store = CapsuleStore::new(&service.storage);

        let lock = service.locks.handle(owner);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let capsule = store.get(owner, id)?;
        warn!(owner = %owner, capsule = %id, "forcing unlock");
        let decision = service.engine.forced(&capsule, now);
        service.apply(&store, &capsule, decision, &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capsule::CapsuleStatus;
    use crate::clock::ManualClock;
    use crate::config::ChainNetwork;
    use crate::error::VerificationFailure;
    use crate::storage::MemoryStorage;
    use crate::test_support::TestWallet;
    use crate::unlock::QuorumPolicy;
    use chrono::{Duration, Utc};

    struct Harness {
        service: CapsuleService<MemoryStorage>,
        clock: ManualClock,
    }

    impl Harness {
        fn new(config: VaultConfig) -> Self {
            let clock = ManualClock::new(Utc::now());
            let service =
                CapsuleService::new(MemoryStorage::new(), MasterKey::from_bytes([5u8; 32]), config)
                    .with_clock(Arc::new(clock.clone()));
            Self { service, clock }
        }

        fn login(&self, wallet: &TestWallet) -> SessionToken {
            let address = wallet.address(ChainNetwork::Bitcoin);
            let challenge = self
                .service
                .issue_challenge(address.as_str(), ProofPurpose::Session)
                .unwrap();
            *self
                .service
                .verify_ownership(address.as_str(), &challenge.id, &wallet.sign(&challenge.message()))
                .unwrap()
                .token()
        }

        fn attest(&self, guardian: &TestWallet, owner: &BtcAddress, id: CapsuleId) -> Attestation {
            let address = guardian.address(ChainNetwork::Bitcoin);
            let challenge = self
                .service
                .issue_challenge(
                    address.as_str(),
                    ProofPurpose::EmergencyUnlock {
                        owner: owner.clone(),
                        capsule: id,
                    },
                )
                .unwrap();
            Attestation {
                guardian: address,
                challenge_id: challenge.id,
                signature: guardian.sign(&challenge.message()),
            }
        }
    }

    fn status(service: &CapsuleService<MemoryStorage>, token: &SessionToken) -> CapsuleStatus {
        service.list_capsules(token).unwrap()[0].status
    }

    #[test]
    fn test_time_unlock_flow() {
        let h = Harness::new(VaultConfig::default());
        let owner = TestWallet::new(1);
        let token = h.login(&owner);

        let receipt = h
            .service
            .create_capsule(&token, b"hello future", UnlockDelay::OneDay)
            .unwrap();
        assert_eq!(receipt.index, CapsuleId::new(0));
        assert!(receipt.confirmation.starts_with("Time capsule #0 sealed; unlocks in 1 day"));

        let early = h.service.unlock_capsule(&token, receipt.index);
        assert!(matches!(early, Err(CapsuleError::NotYetUnlockable { .. })));
        assert_eq!(status(&h.service, &token), CapsuleStatus::Locked);

        h.clock.advance(Duration::days(1));
        let opened = h.service.unlock_capsule(&token, receipt.index).unwrap();
        assert_eq!(opened.as_slice(), b"hello future");
        assert_eq!(status(&h.service, &token), CapsuleStatus::Unlocked);

        let again = h.service.unlock_capsule(&token, receipt.index).unwrap();
        assert_eq!(again.as_slice(), b"hello future");
    }

    #[test]
    fn test_operations_require_session() {
        let h = Harness::new(VaultConfig::default());
        let stranger: SessionToken = Uuid::new_v4().to_string().parse().unwrap();

        assert!(matches!(
            h.service.create_capsule(&stranger, b"x", UnlockDelay::OneDay),
            Err(CapsuleError::NotAuthenticated)
        ));
        assert!(matches!(
            h.service.list_guardians(&stranger),
            Err(CapsuleError::NotAuthenticated)
        ));
    }

    #[test]
    fn test_session_expiry_and_end() {
        let h = Harness::new(VaultConfig::default());
        let owner = TestWallet::new(1);
        let token = h.login(&owner);
        assert!(matches!(
            h.service.identity_status(Some(&token)),
            IdentityStatus::Verified { .. }
        ));

        h.clock.advance(Duration::hours(1));
        assert_eq!(h.service.identity_status(Some(&token)), IdentityStatus::Unverified);
        assert!(matches!(
            h.service.list_capsules(&token),
            Err(CapsuleError::NotAuthenticated)
        ));

        let token = h.login(&owner);
        assert!(h.service.end_session(&token));
        assert!(!h.service.end_session(&token));
    }

    #[test]
    fn test_custom_delay_needs_policy() {
        let h = Harness::new(VaultConfig::default());
        let token = h.login(&TestWallet::new(1));
        let result = h
            .service
            .create_capsule(&token, b"x", UnlockDelay::Custom { secs: 60 });
        assert!(matches!(result, Err(CapsuleError::InvalidInput(_))));
        assert!(h.service.list_capsules(&token).unwrap().is_empty());
    }

    #[test]
    fn test_guardian_quorum_flow() {
        let h = Harness::new(VaultConfig::default());
        let owner = TestWallet::new(1);
        let g1 = TestWallet::new(2);
        let g2 = TestWallet::new(3);
        let owner_addr = owner.address(ChainNetwork::Bitcoin);
        let token = h.login(&owner);

        h.service
            .add_guardian(&token, g1.address(ChainNetwork::Bitcoin).as_str())
            .unwrap();
        h.service
            .add_guardian(&token, g2.address(ChainNetwork::Bitcoin).as_str())
            .unwrap();
        let id = h
            .service
            .create_capsule(&token, b"break glass", UnlockDelay::ThirtyDays)
            .unwrap()
            .index;

        let first = h.attest(&g1, &owner_addr, id);
        let short = h
            .service
            .guardian_unlock(&token, owner_addr.as_str(), id, std::slice::from_ref(&first));
        assert!(matches!(
            short,
            Err(CapsuleError::QuorumNotMet {
                attested: 1,
                required: 2
            })
        ));
        assert_eq!(status(&h.service, &token), CapsuleStatus::Locked);

        // The failed attempt did not spend g1's attestation.
        let second = h.attest(&g2, &owner_addr, id);
        let opened = h
            .service
            .guardian_unlock(&token, owner_addr.as_str(), id, &[first.clone(), second])
            .unwrap();
        assert_eq!(opened.as_slice(), b"break glass");

        let summary = &h.service.list_capsules(&token).unwrap()[0];
        let record = summary.unlocked.as_ref().unwrap();
        assert_eq!(record.method, UnlockMethod::GuardianQuorum);
        assert_eq!(record.attestations.len(), 2);

        let replay = h.service.guardian_unlock(&token, owner_addr.as_str(), CapsuleId::new(0), &[first]);
        assert!(replay.is_ok(), "unlocked capsules reopen without a quorum check");
    }

    #[test]
    fn test_guardian_unlock_authorization() {
        let h = Harness::new(VaultConfig::default());
        let owner = TestWallet::new(1);
        let guardian = TestWallet::new(2);
        let stranger = TestWallet::new(3);
        let owner_addr = owner.address(ChainNetwork::Bitcoin);
        let owner_token = h.login(&owner);
        let id = h
            .service
            .create_capsule(&owner_token, b"s", UnlockDelay::SevenDays)
            .unwrap()
            .index;

        let no_guardians = h.service.guardian_unlock(&owner_token, owner_addr.as_str(), id, &[]);
        assert!(matches!(no_guardians, Err(CapsuleError::NoGuardiansConfigured)));

        h.service
            .add_guardian(&owner_token, guardian.address(ChainNetwork::Bitcoin).as_str())
            .unwrap();

        let stranger_token = h.login(&stranger);
        let refused = h.service.guardian_unlock(&stranger_token, owner_addr.as_str(), id, &[]);
        assert!(matches!(refused, Err(CapsuleError::Unauthorized(_))));

        let guardian_token = h.login(&guardian);
        let attestation = h.attest(&guardian, &owner_addr, id);
        let opened = h
            .service
            .guardian_unlock(&guardian_token, owner_addr.as_str(), id, &[attestation])
            .unwrap();
        assert_eq!(opened.as_slice(), b"s");
    }

    #[test]
    fn test_untrusted_attester_rejected() {
        let h = Harness::new(VaultConfig::default());
        let owner = TestWallet::new(1);
        let guardian = TestWallet::new(2);
        let outsider = TestWallet::new(3);
        let owner_addr = owner.address(ChainNetwork::Bitcoin);
        let token = h.login(&owner);
        h.service
            .add_guardian(&token, guardian.address(ChainNetwork::Bitcoin).as_str())
            .unwrap();
        let id = h
            .service
            .create_capsule(&token, b"s", UnlockDelay::OneDay)
            .unwrap()
            .index;

        let forged = h.attest(&outsider, &owner_addr, id);
        let result = h
            .service
            .guardian_unlock(&token, owner_addr.as_str(), id, &[forged]);
        assert!(matches!(result, Err(CapsuleError::InvalidGuardian(_))));
    }

    #[test]
    fn test_attestation_bound_to_capsule() {
        let h = Harness::new(VaultConfig::default());
        let owner = TestWallet::new(1);
        let guardian = TestWallet::new(2);
        let owner_addr = owner.address(ChainNetwork::Bitcoin);
        let token = h.login(&owner);
        h.service
            .add_guardian(&token, guardian.address(ChainNetwork::Bitcoin).as_str())
            .unwrap();
        h.service.create_capsule(&token, b"a", UnlockDelay::OneDay).unwrap();
        h.service.create_capsule(&token, b"b", UnlockDelay::OneDay).unwrap();

        let for_first = h.attest(&guardian, &owner_addr, CapsuleId::new(0));
        let result =
            h.service
                .guardian_unlock(&token, owner_addr.as_str(), CapsuleId::new(1), &[for_first]);
        assert!(matches!(
            result,
            Err(CapsuleError::Verification(VerificationFailure::PurposeMismatch))
        ));
    }

    #[test]
    fn test_add_guardian_rejects_self_and_garbage() {
        let h = Harness::new(VaultConfig::default());
        let owner = TestWallet::new(1);
        let token = h.login(&owner);

        assert!(matches!(
            h.service
                .add_guardian(&token, owner.address(ChainNetwork::Bitcoin).as_str()),
            Err(CapsuleError::InvalidGuardian(_))
        ));
        assert!(matches!(
            h.service.add_guardian(&token, "not-an-address"),
            Err(CapsuleError::InvalidGuardian(_))
        ));
    }

    #[test]
    fn test_quorum_status_follows_policy() {
        let config = VaultConfig {
            quorum: QuorumPolicy::All,
            ..VaultConfig::default()
        };
        let h = Harness::new(config);
        let owner = TestWallet::new(1);
        let token = h.login(&owner);
        for seed in 2..5 {
            h.service
                .add_guardian(&token, TestWallet::new(seed).address(ChainNetwork::Bitcoin).as_str())
                .unwrap();
        }

        let status = h.service.quorum_status(&token, None).unwrap();
        assert_eq!((status.registered, status.required), (3, 3));
    }

    #[test]
    fn test_force_unlock_requires_test_mode() {
        let h = Harness::new(VaultConfig::default());
        assert!(matches!(
            h.service.test_mode(),
            Err(CapsuleError::TestModeDisabled)
        ));

        let h = Harness::new(VaultConfig {
            test_mode: true,
            ..VaultConfig::default()
        });
        let token = h.login(&TestWallet::new(1));
        let id = h
            .service
            .create_capsule(&token, b"now", UnlockDelay::ThirtyDays)
            .unwrap()
            .index;

        let opened = h.service.test_mode().unwrap().force_unlock(&token, id).unwrap();
        assert_eq!(opened.as_slice(), b"now");
        let summary = &h.service.list_capsules(&token).unwrap()[0];
        assert_eq!(summary.unlocked.as_ref().unwrap().method, UnlockMethod::Forced);
    }

    #[test]
    fn test_concurrent_creates_get_distinct_indices() {
        let h = Harness::new(VaultConfig::default());
        let token = h.login(&TestWallet::new(1));
        let service = &h.service;

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    service
                        .create_capsule(&token, b"race", UnlockDelay::OneDay)
                        .unwrap();
                });
            }
        });

        let indices: Vec<u32> = service
            .list_capsules(&token)
            .unwrap()
            .iter()
            .map(|c| c.index.index())
            .collect();
        assert_eq!(indices, (0..8).collect::<Vec<_>>());
    }
}
