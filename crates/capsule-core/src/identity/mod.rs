//! Ownership proofs and sessions.
//!
//! An owner proves control of a Bitcoin address by signing a challenge the
//! verifier chose. A successful proof yields a [`VerifiedIdentity`] bound to
//! a session token; every owner-scoped operation resolves that token first.

mod address;
mod challenge;
mod session;
mod signature;
mod verifier;

pub use address::BtcAddress;
pub use challenge::{Challenge, ProofPurpose};
pub use session::{IdentityStatus, SessionRegistry, SessionToken, VerifiedIdentity};
pub use signature::{BitcoinMessageScheme, SignatureScheme};
pub use verifier::{Attestation, IdentityVerifier, VerifiedAttestations};
