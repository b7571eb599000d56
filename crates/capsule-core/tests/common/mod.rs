#![allow(dead_code)]

use std::sync::Arc;

use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{All, Message, Secp256k1, SecretKey};
use bitcoin::sign_message::{signed_msg_hash, MessageSignature};
use bitcoin::{Address, PublicKey};
use chrono::Utc;

use capsule_core::clock::ManualClock;
use capsule_core::crypto::{KdfParams, MasterKey};
use capsule_core::identity::{Attestation, BtcAddress, ProofPurpose, SessionToken};
use capsule_core::{CapsuleId, CapsuleService, ChainNetwork, StorageEngine, VaultConfig};

pub const PASSPHRASE: &str = "test-passphrase-secure-123";

/// Argon2id parameters cheap enough for tests.
pub fn cheap_kdf() -> KdfParams {
    KdfParams {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    }
}

/// A P2PKH key pair derived from a one-byte seed in `1..=0x7f`.
pub struct TestWallet {
    secp: Secp256k1<All>,
    secret: SecretKey,
    public: PublicKey,
}

impl TestWallet {
    pub fn new(seed: u8) -> Self {
        let secp = Secp256k1::new();
        let secret = SecretKey::from_slice(&[seed; 32]).expect("seed yields a valid key");
        let public = PublicKey::new(secret.public_key(&secp));
        Self {
            secp,
            secret,
            public,
        }
    }

    pub fn address(&self) -> BtcAddress {
        let raw = Address::p2pkh(self.public.pubkey_hash(), bitcoin::Network::Bitcoin).to_string();
        BtcAddress::parse(&raw, ChainNetwork::Bitcoin).expect("wallet address is valid")
    }

    pub fn sign(&self, message: &str) -> String {
        let digest = Message::from_digest(signed_msg_hash(message).to_byte_array());
        let signature = self.secp.sign_ecdsa_recoverable(&digest, &self.secret);
        MessageSignature::new(signature, true).to_base64()
    }
}

/// A service with a controllable clock.
pub fn service_at<S: StorageEngine>(
    storage: S,
    master: MasterKey,
    config: VaultConfig,
) -> (CapsuleService<S>, ManualClock) {
    let clock = ManualClock::new(Utc::now());
    let service = CapsuleService::new(storage, master, config).with_clock(Arc::new(clock.clone()));
    (service, clock)
}

pub fn login<S: StorageEngine>(service: &CapsuleService<S>, wallet: &TestWallet) -> SessionToken {
    let address = wallet.address();
    let challenge = service
        .issue_challenge(address.as_str(), ProofPurpose::Session)
        .expect("challenge issued");
    *service
        .verify_ownership(address.as_str(), &challenge.id, &wallet.sign(&challenge.message()))
        .expect("ownership verified")
        .token()
}

pub fn attest<S: StorageEngine>(
    service: &CapsuleService<S>,
    guardian: &TestWallet,
    owner: &BtcAddress,
    capsule: CapsuleId,
) -> Attestation {
    let address = guardian.address();
    let challenge = service
        .issue_challenge(
            address.as_str(),
            ProofPurpose::EmergencyUnlock {
                owner: owner.clone(),
                capsule,
            },
        )
        .expect("challenge issued");
    Attestation {
        guardian: address,
        challenge_id: challenge.id,
        signature: guardian.sign(&challenge.message()),
    }
}
