//! Identity verifier: issues challenges and checks ownership proofs.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::ChainNetwork;
use crate::crypto::random_bytes;
use crate::error::{CapsuleError, Result, VerificationFailure};
use crate::storage::StorageEngine;

use super::session::{SessionRegistry, VerifiedIdentity};
use super::signature::SignatureScheme;
use super::{BtcAddress, Challenge, ProofPurpose};

/// How long spent or expired challenges are kept so replays are reported
/// as replays rather than as unknown challenges.
const CHALLENGE_RETENTION_HOURS: i64 = 24;

const NONCE_BYTES: usize = 16;

/// A guardian's signed statement for an emergency unlock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attestation {
    pub guardian: BtcAddress,
    pub challenge_id: Uuid,
    pub signature: String,
}

/// Attestations that passed signature and challenge checks but have not been
/// spent yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifiedAttestations {
    pub guardians: Vec<BtcAddress>,
    pub challenges: Vec<Uuid>,
}

pub struct IdentityVerifier {
    network: ChainNetwork,
    challenge_ttl: Duration,
    scheme: Box<dyn SignatureScheme>,
}

impl IdentityVerifier {
    pub fn new(
        network: ChainNetwork,
        challenge_ttl: Duration,
        scheme: Box<dyn SignatureScheme>,
    ) -> Self {
        Self {
            network,
            challenge_ttl,
            scheme,
        }
    }

    pub fn network(&self) -> ChainNetwork {
        self.network
    }

    /// Validate a raw address for this verifier's network.
    pub fn parse_address(&self, raw: &str) -> Result<BtcAddress> {
        Ok(BtcAddress::parse(raw, self.network)?)
    }

    /// Issue and record a challenge for `address`.
    pub fn issue_challenge<S: StorageEngine + ?Sized>(
        &self,
        storage: &S,
        address: &BtcAddress,
        purpose: ProofPurpose,
        now: DateTime<Utc>,
    ) -> Result<Challenge> {
        let pruned = storage.prune_challenges(now - Duration::hours(CHALLENGE_RETENTION_HOURS))?;
        if pruned > 0 {
            debug!(pruned, "pruned stale challenges");
        }

        let challenge = Challenge {
            id: Uuid::new_v4(),
            address: address.clone(),
            purpose,
            nonce: hex::encode(random_bytes::<NONCE_BYTES>()?),
            issued_at: now,
            expires_at: now + self.challenge_ttl,
            consumed_at: None,
        };
        storage.insert_challenge(&challenge)?;

        debug!(address = %address, challenge = %challenge.id, "challenge issued");
        Ok(challenge)
    }

    /// Verify a session proof. On success the challenge is spent and a
    /// session is established.
    pub fn verify<S: StorageEngine + ?Sized>(
        &self,
        storage: &S,
        sessions: &SessionRegistry,
        address: &BtcAddress,
        challenge_id: &Uuid,
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<VerifiedIdentity> {
        self.check(
            storage,
            address,
            challenge_id,
            signature,
            &ProofPurpose::Session,
            now,
        )
        .inspect_err(|e| debug!(address = %address, error = %e, "ownership proof rejected"))?;

        storage.consume_challenges(std::slice::from_ref(challenge_id), now)?;
        let identity = sessions.establish(address.clone(), now);

        info!(address = %address, expires_at = %identity.expires_at(), "ownership verified");
        Ok(identity)
    }

    /// Check a batch of guardian attestations against one purpose.
    ///
    /// Nothing is spent here. The caller spends the returned challenges in the
    /// same transaction that records the unlock, so a failed unlock leaves
    /// every attestation reusable.
    pub fn verify_attestations<S: StorageEngine + ?Sized>(
        &self,
        storage: &S,
        expected: &ProofPurpose,
        attestations: &[Attestation],
        now: DateTime<Utc>,
    ) -> Result<VerifiedAttestations> {
        let mut seen = HashSet::new();
        let mut verified = VerifiedAttestations::default();

        for attestation in attestations {
            if !seen.insert(attestation.challenge_id) {
                return Err(VerificationFailure::DuplicateChallenge.into());
            }
            self.check(
                storage,
                &attestation.guardian,
                &attestation.challenge_id,
                &attestation.signature,
                expected,
                now,
            )
            .inspect_err(|e| {
                debug!(guardian = %attestation.guardian, error = %e, "attestation rejected")
            })?;
            verified.guardians.push(attestation.guardian.clone());
            verified.challenges.push(attestation.challenge_id);
        }

        Ok(verified)
    }

    fn check<S: StorageEngine + ?Sized>(
        &self,
        storage: &S,
        address: &BtcAddress,
        challenge_id: &Uuid,
        signature: &str,
        expected: &ProofPurpose,
        now: DateTime<Utc>,
    ) -> Result<Challenge> {
        let challenge = storage
            .get_challenge(challenge_id)?
            .ok_or(VerificationFailure::UnknownChallenge)?;

        if challenge.is_consumed() {
            return Err(VerificationFailure::ReplayedChallenge.into());
        }
        if challenge.is_expired(now) {
            return Err(VerificationFailure::ExpiredChallenge.into());
        }
        if &challenge.address != address {
            return Err(VerificationFailure::AddressMismatch.into());
        }
        if &challenge.purpose != expected {
            return Err(VerificationFailure::PurposeMismatch.into());
        }

        self.scheme
            .verify(address, &challenge.message(), signature)
            .map_err(CapsuleError::from)?;

        Ok(challenge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capsule::CapsuleId;
    use crate::identity::BitcoinMessageScheme;
    use crate::storage::MemoryStorage;
    use crate::test_support::TestWallet;

    struct Fixture {
        storage: MemoryStorage,
        sessions: SessionRegistry,
        verifier: IdentityVerifier,
        now: DateTime<Utc>,
    }

    fn fixture() -> Fixture {
        Fixture {
            storage: MemoryStorage::new(),
            sessions: SessionRegistry::new(Duration::hours(1)),
            verifier: IdentityVerifier::new(
                ChainNetwork::Bitcoin,
                Duration::minutes(5),
                Box::new(BitcoinMessageScheme::new()),
            ),
            now: Utc::now(),
        }
    }

    fn failure(result: Result<impl std::fmt::Debug>) -> VerificationFailure {
        match result {
            Err(CapsuleError::Verification(failure)) => failure,
            other => panic!("expected verification failure, got {:?}", other),
        }
    }

    #[test]
    fn test_verify_happy_path() {
        let fx = fixture();
        let wallet = TestWallet::new(1);
        let address = wallet.address(ChainNetwork::Bitcoin);

        let challenge = fx
            .verifier
            .issue_challenge(&fx.storage, &address, ProofPurpose::Session, fx.now)
            .unwrap();
        assert_eq!(challenge.nonce.len(), NONCE_BYTES * 2);

        let identity = fx
            .verifier
            .verify(
                &fx.storage,
                &fx.sessions,
                &address,
                &challenge.id,
                &wallet.sign(&challenge.message()),
                fx.now,
            )
            .unwrap();
        assert_eq!(identity.address(), &address);
        assert!(fx.sessions.resolve(Some(identity.token()), fx.now).is_ok());
    }

    #[test]
    fn test_replay_rejected() {
        let fx = fixture();
        let wallet = TestWallet::new(1);
        let address = wallet.address(ChainNetwork::Bitcoin);
        let challenge = fx
            .verifier
            .issue_challenge(&fx.storage, &address, ProofPurpose::Session, fx.now)
            .unwrap();
        let signature = wallet.sign(&challenge.message());

        fx.verifier
            .verify(&fx.storage, &fx.sessions, &address, &challenge.id, &signature, fx.now)
            .unwrap();
        let again =
            fx.verifier
                .verify(&fx.storage, &fx.sessions, &address, &challenge.id, &signature, fx.now);
        assert_eq!(failure(again), VerificationFailure::ReplayedChallenge);
    }

    #[test]
    fn test_expired_challenge_rejected() {
        let fx = fixture();
        let wallet = TestWallet::new(1);
        let address = wallet.address(ChainNetwork::Bitcoin);
        let challenge = fx
            .verifier
            .issue_challenge(&fx.storage, &address, ProofPurpose::Session, fx.now)
            .unwrap();

        let result = fx.verifier.verify(
            &fx.storage,
            &fx.sessions,
            &address,
            &challenge.id,
            &wallet.sign(&challenge.message()),
            fx.now + Duration::minutes(5),
        );
        assert_eq!(failure(result), VerificationFailure::ExpiredChallenge);
        assert!(fx.sessions.is_empty());
    }

    #[test]
    fn test_unknown_challenge_rejected() {
        let fx = fixture();
        let wallet = TestWallet::new(1);
        let result = fx.verifier.verify(
            &fx.storage,
            &fx.sessions,
            &wallet.address(ChainNetwork::Bitcoin),
            &Uuid::new_v4(),
            &wallet.sign("anything"),
            fx.now,
        );
        assert_eq!(failure(result), VerificationFailure::UnknownChallenge);
    }

    #[test]
    fn test_challenge_for_other_address_rejected() {
        let fx = fixture();
        let alice = TestWallet::new(1);
        let mallory = TestWallet::new(2);
        let challenge = fx
            .verifier
            .issue_challenge(
                &fx.storage,
                &alice.address(ChainNetwork::Bitcoin),
                ProofPurpose::Session,
                fx.now,
            )
            .unwrap();

        let result = fx.verifier.verify(
            &fx.storage,
            &fx.sessions,
            &mallory.address(ChainNetwork::Bitcoin),
            &challenge.id,
            &mallory.sign(&challenge.message()),
            fx.now,
        );
        assert_eq!(failure(result), VerificationFailure::AddressMismatch);
    }

    #[test]
    fn test_signature_over_other_text_rejected() {
        let fx = fixture();
        let wallet = TestWallet::new(1);
        let address = wallet.address(ChainNetwork::Bitcoin);
        let challenge = fx
            .verifier
            .issue_challenge(&fx.storage, &address, ProofPurpose::Session, fx.now)
            .unwrap();

        let result = fx.verifier.verify(
            &fx.storage,
            &fx.sessions,
            &address,
            &challenge.id,
            &wallet.sign("send 1 BTC to mallory"),
            fx.now,
        );
        assert_eq!(failure(result), VerificationFailure::SignatureMismatch);

        // A failed attempt does not spend the challenge.
        fx.verifier
            .verify(
                &fx.storage,
                &fx.sessions,
                &address,
                &challenge.id,
                &wallet.sign(&challenge.message()),
                fx.now,
            )
            .unwrap();
    }

    #[test]
    fn test_emergency_challenge_cannot_open_session() {
        let fx = fixture();
        let guardian = TestWallet::new(2);
        let address = guardian.address(ChainNetwork::Bitcoin);
        let purpose = ProofPurpose::EmergencyUnlock {
            owner: TestWallet::new(1).address(ChainNetwork::Bitcoin),
            capsule: CapsuleId::new(0),
        };
        let challenge = fx
            .verifier
            .issue_challenge(&fx.storage, &address, purpose, fx.now)
            .unwrap();

        let result = fx.verifier.verify(
            &fx.storage,
            &fx.sessions,
            &address,
            &challenge.id,
            &guardian.sign(&challenge.message()),
            fx.now,
        );
        assert_eq!(failure(result), VerificationFailure::PurposeMismatch);
    }

    #[test]
    fn test_attestations_not_spent_and_duplicates_rejected() {
        let fx = fixture();
        let owner = TestWallet::new(1).address(ChainNetwork::Bitcoin);
        let guardian = TestWallet::new(2);
        let purpose = ProofPurpose::EmergencyUnlock {
            owner,
            capsule: CapsuleId::new(0),
        };
        let challenge = fx
            .verifier
            .issue_challenge(
                &fx.storage,
                &guardian.address(ChainNetwork::Bitcoin),
                purpose.clone(),
                fx.now,
            )
            .unwrap();
        let attestation = Attestation {
            guardian: guardian.address(ChainNetwork::Bitcoin),
            challenge_id: challenge.id,
            signature: guardian.sign(&challenge.message()),
        };

        let verified = fx
            .verifier
            .verify_attestations(&fx.storage, &purpose, &[attestation.clone()], fx.now)
            .unwrap();
        assert_eq!(verified.challenges, vec![challenge.id]);

        // Still unspent, so it verifies again.
        fx.verifier
            .verify_attestations(&fx.storage, &purpose, &[attestation.clone()], fx.now)
            .unwrap();

        let doubled = fx.verifier.verify_attestations(
            &fx.storage,
            &purpose,
            &[attestation.clone(), attestation],
            fx.now,
        );
        assert_eq!(failure(doubled), VerificationFailure::DuplicateChallenge);
    }
}
