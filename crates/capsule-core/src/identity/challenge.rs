//! Ownership challenges.
//!
//! A challenge is a verifier-chosen message with a fixed, line-oriented
//! format. Signers never sign caller-supplied text, so a proof cannot be
//! lifted from an unrelated signed message.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::capsule::CapsuleId;

use super::BtcAddress;

const HEADER: &str = "Time Capsule ownership proof";

/// What a signed challenge may be used for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProofPurpose {
    /// Establish a session for the signing address.
    Session,
    /// Attest, as a guardian, to unlocking one specific capsule.
    EmergencyUnlock { owner: BtcAddress, capsule: CapsuleId },
}

impl fmt::Display for ProofPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProofPurpose::Session => f.write_str("session"),
            ProofPurpose::EmergencyUnlock { owner, capsule } => {
                write!(f, "emergency-unlock {} {}", owner, capsule)
            }
        }
    }
}

/// An issued challenge and its lifecycle timestamps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Challenge {
    pub id: Uuid,
    pub address: BtcAddress,
    pub purpose: ProofPurpose,
    /// 16 random bytes, hex encoded.
    pub nonce: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub consumed_at: Option<DateTime<Utc>>,
}

impl Challenge {
    /// The exact text the address owner must sign.
    pub fn message(&self) -> String {
        format!(
            "{}\nAddress: {}\nPurpose: {}\nNonce: {}\nIssued: {}\nExpires: {}",
            HEADER,
            self.address,
            self.purpose,
            self.nonce,
            self.issued_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        )
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_consumed(&self) -> bool {
        self.consumed_at.is_some()
    }
}
