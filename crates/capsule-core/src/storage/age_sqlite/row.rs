//! Row types for database queries.
//!
//! Rows hold raw column values; `TryFrom` conversions rebuild domain types
//! and reject anything that breaks a stored-record invariant.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::capsule::{Capsule, CapsuleId, UnlockDelay, UnlockMethod, UnlockRecord};
use crate::crypto::seal::NONCE_LEN;
use crate::crypto::SealedPayload;
use crate::error::{CapsuleError, Result};
use crate::identity::{BtcAddress, Challenge, ProofPurpose};
use crate::storage::types::Guardian;

/// Fixed-width UTC timestamps so text comparison orders chronologically.
pub fn format_ts(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn parse_ts(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| CapsuleError::Storage(format!("Invalid {} timestamp: {}", field, e)))
}

pub const CAPSULE_COLUMNS: &str = "owner, idx, nonce, ciphertext, created_at, unlock_delay_secs, \
     unlock_time, status, unlocked_at, unlock_method, attestations_json";

/// Raw row data from the capsules table.
#[derive(Debug)]
pub struct CapsuleRow {
    pub owner: String,
    pub idx: i64,
    pub nonce: Vec<u8>,
    pub ciphertext: Vec<u8>,
    pub created_at: String,
    pub unlock_delay_secs: i64,
    pub unlock_time: String,
    pub status: String,
    pub unlocked_at: Option<String>,
    pub unlock_method: Option<String>,
    pub attestations_json: Option<String>,
}

impl CapsuleRow {
    /// Read a row selected with [`CAPSULE_COLUMNS`].
    pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            owner: row.get(0)?,
            idx: row.get(1)?,
            nonce: row.get(2)?,
            ciphertext: row.get(3)?,
            created_at: row.get(4)?,
            unlock_delay_secs: row.get(5)?,
            unlock_time: row.get(6)?,
            status: row.get(7)?,
            unlocked_at: row.get(8)?,
            unlock_method: row.get(9)?,
            attestations_json: row.get(10)?,
        })
    }
}

impl TryFrom<CapsuleRow> for Capsule {
    type Error = CapsuleError;

    fn try_from(row: CapsuleRow) -> Result<Self> {
        let index = u32::try_from(row.idx)
            .map_err(|_| CapsuleError::Storage(format!("Invalid capsule index: {}", row.idx)))?;
        let nonce: [u8; NONCE_LEN] = row
            .nonce
            .as_slice()
            .try_into()
            .map_err(|_| CapsuleError::Storage("Invalid capsule nonce length".to_string()))?;
        let delay_secs = u64::try_from(row.unlock_delay_secs).map_err(|_| {
            CapsuleError::Storage(format!("Invalid unlock delay: {}", row.unlock_delay_secs))
        })?;

        let unlocked = match (row.status.as_str(), row.unlocked_at, row.unlock_method) {
            ("locked", None, None) => None,
            ("unlocked", Some(at), Some(method)) => {
                let attestations: Vec<String> = match row.attestations_json {
                    Some(ref json) => serde_json::from_str(json).map_err(|e| {
                        CapsuleError::Storage(format!("Invalid attestations JSON: {}", e))
                    })?,
                    None => Vec::new(),
                };
                Some(UnlockRecord {
                    unlocked_at: parse_ts(&at, "unlocked_at")?,
                    method: UnlockMethod::parse(&method)?,
                    attestations: attestations
                        .into_iter()
                        .map(BtcAddress::from_trusted)
                        .collect(),
                })
            }
            (status, _, _) => {
                return Err(CapsuleError::Invariant(format!(
                    "Capsule #{} has inconsistent status '{}'",
                    index, status
                )))
            }
        };

        Ok(Capsule {
            owner: BtcAddress::from_trusted(row.owner),
            id: CapsuleId::new(index),
            sealed: SealedPayload {
                nonce,
                ciphertext: row.ciphertext,
            },
            created_at: parse_ts(&row.created_at, "created_at")?,
            unlock_delay: UnlockDelay::from_secs(delay_secs)?,
            unlock_time: parse_ts(&row.unlock_time, "unlock_time")?,
            unlocked,
        })
    }
}

/// Serialized form of [`ProofPurpose`] in `challenges.purpose_json`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum PurposeRow {
    Session,
    EmergencyUnlock { owner: String, capsule: u32 },
}

pub fn purpose_to_json(purpose: &ProofPurpose) -> Result<String> {
    let row = match purpose {
        ProofPurpose::Session => PurposeRow::Session,
        ProofPurpose::EmergencyUnlock { owner, capsule } => PurposeRow::EmergencyUnlock {
            owner: owner.to_string(),
            capsule: capsule.index(),
        },
    };
    Ok(serde_json::to_string(&row)?)
}

/// Raw row data from the challenges table.
#[derive(Debug)]
pub struct ChallengeRow {
    pub id: String,
    pub address: String,
    pub purpose_json: String,
    pub nonce: String,
    pub issued_at: String,
    pub expires_at: String,
    pub consumed_at: Option<String>,
}

impl TryFrom<ChallengeRow> for Challenge {
    type Error = CapsuleError;

    fn try_from(row: ChallengeRow) -> Result<Self> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| CapsuleError::Storage(format!("Invalid challenge UUID: {}", e)))?;
        let purpose = match serde_json::from_str::<PurposeRow>(&row.purpose_json)
            .map_err(|e| CapsuleError::Storage(format!("Invalid purpose JSON: {}", e)))?
        {
            PurposeRow::Session => ProofPurpose::Session,
            PurposeRow::EmergencyUnlock { owner, capsule } => ProofPurpose::EmergencyUnlock {
                owner: BtcAddress::from_trusted(owner),
                capsule: CapsuleId::new(capsule),
            },
        };

        Ok(Challenge {
            id,
            address: BtcAddress::from_trusted(row.address),
            purpose,
            nonce: row.nonce,
            issued_at: parse_ts(&row.issued_at, "issued_at")?,
            expires_at: parse_ts(&row.expires_at, "expires_at")?,
            consumed_at: row
                .consumed_at
                .as_deref()
                .map(|value| parse_ts(value, "consumed_at"))
                .transpose()?,
        })
    }
}

/// Raw row data from the guardians table.
#[derive(Debug)]
pub struct GuardianRow {
    pub guardian: String,
    pub trusted: bool,
    pub added_at: String,
}

impl TryFrom<GuardianRow> for Guardian {
    type Error = CapsuleError;

    fn try_from(row: GuardianRow) -> Result<Self> {
        Ok(Guardian {
            address: BtcAddress::from_trusted(row.guardian),
            trusted: row.trusted,
            added_at: parse_ts(&row.added_at, "added_at")?,
        })
    }
}
