//! Signature schemes for ownership proofs.

use bitcoin::secp256k1::{Secp256k1, VerifyOnly};
use bitcoin::sign_message::{signed_msg_hash, MessageSignature};

use crate::error::VerificationFailure;

use super::BtcAddress;

/// Checks that `signature` over `message` was produced by the key behind `address`.
pub trait SignatureScheme: Send + Sync {
    fn verify(
        &self,
        address: &BtcAddress,
        message: &str,
        signature: &str,
    ) -> Result<(), VerificationFailure>;
}

/// Bitcoin signed-message signatures (the `signmessage` RPC format).
///
/// The signature is a base64 compact recoverable ECDSA signature over the
/// "Bitcoin Signed Message" hash. The recovered public key must control the
/// address; P2PKH, P2WPKH and P2SH-P2WPKH addresses are supported.
pub struct BitcoinMessageScheme {
    secp: Secp256k1<VerifyOnly>,
}

impl BitcoinMessageScheme {
    pub fn new() -> Self {
        Self {
            secp: Secp256k1::verification_only(),
        }
    }
}

impl Default for BitcoinMessageScheme {
    fn default() -> Self {
        Self::new()
    }
}

impl SignatureScheme for BitcoinMessageScheme {
    fn verify(
        &self,
        address: &BtcAddress,
        message: &str,
        signature: &str,
    ) -> Result<(), VerificationFailure> {
        let signature = MessageSignature::from_base64(signature.trim())
            .map_err(|e| VerificationFailure::MalformedSignature(e.to_string()))?;
        let address = address.to_bitcoin()?;

        let pubkey = signature
            .recover_pubkey(&self.secp, signed_msg_hash(message))
            .map_err(|_| VerificationFailure::SignatureMismatch)?;

        if address.is_related_to_pubkey(&pubkey) {
            Ok(())
        } else {
            Err(VerificationFailure::SignatureMismatch)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChainNetwork;
    use crate::test_support::TestWallet;

    #[test]
    fn test_valid_signature_accepted() {
        let wallet = TestWallet::new(1);
        let address = wallet.address(ChainNetwork::Bitcoin);
        let signature = wallet.sign("hello capsule");

        BitcoinMessageScheme::new()
            .verify(&address, "hello capsule", &signature)
            .unwrap();
    }

    #[test]
    fn test_different_message_rejected() {
        let wallet = TestWallet::new(1);
        let address = wallet.address(ChainNetwork::Bitcoin);
        let signature = wallet.sign("hello capsule");

        let err = BitcoinMessageScheme::new()
            .verify(&address, "hello capsules", &signature)
            .unwrap_err();
        assert_eq!(err, VerificationFailure::SignatureMismatch);
    }

    #[test]
    fn test_other_key_rejected() {
        let owner = TestWallet::new(1).address(ChainNetwork::Bitcoin);
        let signature = TestWallet::new(2).sign("hello capsule");

        let err = BitcoinMessageScheme::new()
            .verify(&owner, "hello capsule", &signature)
            .unwrap_err();
        assert_eq!(err, VerificationFailure::SignatureMismatch);
    }

    #[test]
    fn test_garbage_signature_is_malformed() {
        let address = TestWallet::new(1).address(ChainNetwork::Bitcoin);
        let err = BitcoinMessageScheme::new()
            .verify(&address, "hello", "not base64 at all!")
            .unwrap_err();
        assert!(matches!(err, VerificationFailure::MalformedSignature(_)));
    }
}
