//! Deterministic wallets for unit tests.

use bitcoin::hashes::Hash;
use bitcoin::secp256k1::{All, Message, Secp256k1, SecretKey};
use bitcoin::sign_message::{signed_msg_hash, MessageSignature};
use bitcoin::{Address, PublicKey};

use crate::config::ChainNetwork;
use crate::identity::BtcAddress;

/// A P2PKH key pair derived from a one-byte seed.
pub struct TestWallet {
    secp: Secp256k1<All>,
    secret: SecretKey,
    public: PublicKey,
}

impl TestWallet {
    /// `seed` must be in `1..=0x7f` so the key stays below the curve order.
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

    pub fn address(&self, network: ChainNetwork) -> BtcAddress {
        let raw = Address::p2pkh(self.public.pubkey_hash(), network.to_bitcoin()).to_string();
        BtcAddress::parse(&raw, network).expect("wallet address is valid")
    }

    /// Base64 signed-message signature over `message`.
    pub fn sign(&self, message: &str) -> String {
        let digest = Message::from_digest(signed_msg_hash(message).to_byte_array());
        let signature = self.secp.sign_ecdsa_recoverable(&digest, &self.secret);
        MessageSignature::new(signature, true).to_base64()
    }
}
