//! Record types shared by storage engines.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::identity::BtcAddress;

/// Metadata for a vault.
#[derive(Debug, Clone, Serialize)]
pub struct VaultMetadata {
    /// Format version (e.g., "1")
    pub format_version: String,

    /// Identifier assigned when the vault was created
    pub vault_id: Uuid,

    /// When this vault was created
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp (informational)
    pub last_modified: DateTime<Utc>,
}

/// One owner -> guardian edge.
///
/// Revoked guardians keep their record (and their position in the list) with
/// `trusted` cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Guardian {
    pub address: BtcAddress,
    pub trusted: bool,
    pub added_at: DateTime<Utc>,
}
