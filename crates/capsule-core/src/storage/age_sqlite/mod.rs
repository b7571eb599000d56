//! Age-encrypted SQLite storage backend.
//!
//! The database is held in memory and serialized to disk with age
//! encryption on close. Triggers in the schema back the capsule invariants:
//! status only moves forward, the schedule and payload never change, and
//! capsules are never deleted.

mod row;

use std::fs;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::serialize::OwnedData;
use rusqlite::{Connection, DatabaseName, OptionalExtension};
use tracing::{debug, info};
use uuid::Uuid;

use crate::capsule::{Capsule, CapsuleId, UnlockRecord};
use crate::crypto::{derive_master_key, random_bytes, validate_passphrase, KdfParams, MasterKey};
use crate::error::{CapsuleError, Result, VerificationFailure};
use crate::identity::{BtcAddress, Challenge};
use crate::storage::encryption::{decrypt, encrypt};
use crate::storage::traits::StorageEngine;
use crate::storage::types::{Guardian, VaultMetadata};

use row::{
    format_ts, parse_ts, purpose_to_json, CapsuleRow, ChallengeRow, GuardianRow, CAPSULE_COLUMNS,
};

/// Current on-disk schema version.
pub const FORMAT_VERSION: &str = "1";

const KDF_SALT_LEN: usize = 16;

const REQUIRED_META_KEYS: [&str; 6] = [
    "format_version",
    "vault_id",
    "created_at",
    "last_modified",
    "kdf_salt",
    "kdf_params",
];

const SCHEMA: &str = r#"
CREATE TABLE meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE capsules (
    owner TEXT NOT NULL,
    idx INTEGER NOT NULL CHECK (idx >= 0),
    nonce BLOB NOT NULL,
    ciphertext BLOB NOT NULL,
    created_at TEXT NOT NULL,
    unlock_delay_secs INTEGER NOT NULL CHECK (unlock_delay_secs > 0),
    unlock_time TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'locked' CHECK (status IN ('locked', 'unlocked')),
    unlocked_at TEXT,
    unlock_method TEXT,
    attestations_json TEXT,

    PRIMARY KEY (owner, idx),
    CHECK ((status = 'unlocked') = (unlocked_at IS NOT NULL))
);

-- Locked -> unlocked is the only transition
CREATE TRIGGER capsules_status_forward_only
BEFORE UPDATE OF status ON capsules
WHEN OLD.status = 'unlocked'
BEGIN
    SELECT RAISE(ABORT, 'capsule status cannot change after unlock');
END;

-- Schedule and payload are fixed at creation
CREATE TRIGGER capsules_schedule_immutable
BEFORE UPDATE OF owner, idx, nonce, ciphertext, created_at, unlock_delay_secs, unlock_time
ON capsules
BEGIN
    SELECT RAISE(ABORT, 'capsule schedule and payload are immutable');
END;

CREATE TRIGGER capsules_permanent
BEFORE DELETE ON capsules
BEGIN
    SELECT RAISE(ABORT, 'capsules cannot be deleted');
END;

CREATE TABLE guardians (
    owner TEXT NOT NULL,
    guardian TEXT NOT NULL,
    trusted INTEGER NOT NULL DEFAULT 1,
    added_at TEXT NOT NULL,

    PRIMARY KEY (owner, guardian),
    CHECK (owner <> guardian)
);

CREATE TABLE challenges (
    id TEXT PRIMARY KEY,
    address TEXT NOT NULL,
    purpose_json TEXT NOT NULL,
    nonce TEXT NOT NULL,
    issued_at TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    consumed_at TEXT
);

CREATE INDEX challenges_expires_at ON challenges (expires_at);
"#;

/// Age-encrypted SQLite storage engine.
pub struct AgeSqliteStorage {
    path: PathBuf,
    conn: Mutex<Connection>,
    vault_id: Uuid,
}

impl AgeSqliteStorage {
    /// Create a new vault file.
    ///
    /// # Arguments
    ///
    /// * `path` - Where the vault file will be written (must not exist)
    /// * `passphrase` - Passphrase for file encryption and master key derivation
    /// * `kdf` - Argon2id cost parameters recorded in the vault
    ///
    /// # Returns
    ///
    /// Returns the new vault's ID.
    pub fn create(path: &Path, passphrase: &str, kdf: &KdfParams) -> Result<Uuid> {
        if path.exists() {
            return Err(CapsuleError::Storage(
                "Vault file already exists".to_string(),
            ));
        }

        validate_passphrase(passphrase)?;

        let vault_id = Uuid::new_v4();
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        let created_at = format_ts(&Utc::now());
        let salt = hex::encode(random_bytes::<KDF_SALT_LEN>()?);
        let kdf_json = serde_json::to_string(kdf)?;
        let vault_id_str = vault_id.to_string();
        for (key, value) in [
            ("format_version", FORMAT_VERSION),
            ("vault_id", vault_id_str.as_str()),
            ("created_at", created_at.as_str()),
            ("last_modified", created_at.as_str()),
            ("kdf_salt", salt.as_str()),
            ("kdf_params", kdf_json.as_str()),
        ] {
            conn.execute("INSERT INTO meta (key, value) VALUES (?, ?)", [key, value])?;
        }

        let data = conn.serialize(DatabaseName::Main)?;
        let encrypted = encrypt(data.as_ref(), passphrase)?;
        Self::write_vault(path, &encrypted)?;

        info!(vault_id = %vault_id, path = %path.display(), "vault created");
        Ok(vault_id)
    }

    /// Open an existing vault.
    ///
    /// # Errors
    ///
    /// Returns `CapsuleError::VaultNotFound` if the file is missing and
    /// `CapsuleError::IncorrectPassphrase` if it does not decrypt.
    pub fn open(path: &Path, passphrase: &str) -> Result<Self> {
        if !path.exists() {
            return Err(CapsuleError::VaultNotFound);
        }

        validate_passphrase(passphrase)?;

        let encrypted = fs::read(path)?;
        let plaintext = decrypt(&encrypted, passphrase)?;
        let mut conn = Connection::open_in_memory()?;
        let owned_data = Self::owned_data_from_bytes(&plaintext)?;
        conn.deserialize(DatabaseName::Main, owned_data, false)?;

        let format_version = Self::meta_value(&conn, "format_version")?;
        if format_version != FORMAT_VERSION {
            return Err(CapsuleError::Storage(format!(
                "Unsupported vault format version: {}",
                format_version
            )));
        }

        let vault_id = Uuid::parse_str(&Self::meta_value(&conn, "vault_id")?)
            .map_err(|e| CapsuleError::Storage(format!("Invalid vault_id in metadata: {}", e)))?;

        debug!(vault_id = %vault_id, "vault opened");
        Ok(Self {
            path: path.to_path_buf(),
            conn: Mutex::new(conn),
            vault_id,
        })
    }

    /// Derive the master key capsules are sealed under.
    ///
    /// Uses the salt and Argon2id parameters recorded at creation.
    pub fn master_key(&self, passphrase: &str) -> Result<MasterKey> {
        let (salt_hex, params_json) = {
            let conn = self.lock_conn()?;
            (
                Self::meta_value(&conn, "kdf_salt")?,
                Self::meta_value(&conn, "kdf_params")?,
            )
        };
        let salt = hex::decode(&salt_hex)
            .map_err(|e| CapsuleError::Storage(format!("Invalid kdf_salt in metadata: {}", e)))?;
        let params: KdfParams = serde_json::from_str(&params_json)?;
        derive_master_key(passphrase, &salt, &params)
    }

    /// Close the vault, persisting all changes.
    ///
    /// This method encrypts and writes the vault to disk atomically.
    pub fn close(self, passphrase: &str) -> Result<()> {
        validate_passphrase(passphrase)?;
        let conn = self
            .conn
            .into_inner()
            .map_err(|_| CapsuleError::Storage("SQLite connection poisoned".to_string()))?;
        let data = conn.serialize(DatabaseName::Main)?;
        let encrypted = encrypt(data.as_ref(), passphrase)?;
        Self::write_vault(&self.path, &encrypted)?;
        debug!(vault_id = %self.vault_id, "vault saved");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lock the database connection, returning an error if the mutex is poisoned.
    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CapsuleError::Storage("SQLite connection poisoned".to_string()))
    }

    fn meta_value(conn: &Connection, key: &str) -> Result<String> {
        conn.query_row("SELECT value FROM meta WHERE key = ?", [key], |row| {
            row.get(0)
        })
        .optional()?
        .ok_or_else(|| CapsuleError::Storage(format!("Metadata key missing: {}", key)))
    }

    fn touch(conn: &Connection) -> Result<()> {
        conn.execute(
            "UPDATE meta SET value = ? WHERE key = 'last_modified'",
            [format_ts(&Utc::now())],
        )?;
        Ok(())
    }

    fn write_vault(path: &Path, data: &[u8]) -> Result<()> {
        crate::fs::write_atomic(path, data)
            .map_err(|e| CapsuleError::Storage(format!("Vault write failed: {}", e)))
    }

    fn owned_data_from_bytes(bytes: &[u8]) -> Result<OwnedData> {
        if bytes.is_empty() {
            return Err(CapsuleError::Storage("SQLite payload is empty".to_string()));
        }

        let size: i32 = bytes
            .len()
            .try_into()
            .map_err(|_| CapsuleError::Storage("SQLite payload too large".to_string()))?;

        // SAFETY: sqlite3_malloc returns a valid pointer or null; null is
        // rejected below. `size` was checked to fit in i32.
        let raw = unsafe { rusqlite::ffi::sqlite3_malloc(size) as *mut u8 };
        let ptr = NonNull::new(raw)
            .ok_or_else(|| CapsuleError::Storage("SQLite allocation failed".to_string()))?;

        // SAFETY:
        // - `ptr` is writable for `bytes.len()` bytes: sqlite3_malloc(size)
        //   allocated exactly that many
        // - the source slice is valid for reads of `bytes.len()` bytes
        // - the regions don't overlap: `ptr` is freshly allocated
        // - `OwnedData` takes ownership of the sqlite3_malloc'd buffer and
        //   SQLite frees it
        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.as_ptr(), bytes.len());
            Ok(OwnedData::from_raw_nonnull(ptr, bytes.len()))
        }
    }

    fn count_capsules(conn: &Connection, owner: &BtcAddress) -> Result<CapsuleId> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM capsules WHERE owner = ?",
            [owner.as_str()],
            |row| row.get(0),
        )?;
        u32::try_from(count)
            .map(CapsuleId::new)
            .map_err(|_| CapsuleError::InvalidInput("Owner has too many capsules".to_string()))
    }

    /// Spend every challenge in `ids` or fail without changing any.
    ///
    /// Must run inside a transaction; the caller rolls back on error.
    fn spend_challenges(conn: &Connection, ids: &[Uuid], at: &DateTime<Utc>) -> Result<()> {
        let at = format_ts(at);
        for id in ids {
            let changed = conn.execute(
                "UPDATE challenges SET consumed_at = ? WHERE id = ? AND consumed_at IS NULL",
                (&at, id.to_string()),
            )?;
            if changed == 0 {
                let exists: Option<String> = conn
                    .query_row(
                        "SELECT id FROM challenges WHERE id = ?",
                        [id.to_string()],
                        |row| row.get(0),
                    )
                    .optional()?;
                return Err(match exists {
                    Some(_) => VerificationFailure::ReplayedChallenge.into(),
                    None => VerificationFailure::UnknownChallenge.into(),
                });
            }
        }
        Ok(())
    }
}

impl StorageEngine for AgeSqliteStorage {
    fn metadata(&self) -> Result<VaultMetadata> {
        let conn = self.lock_conn()?;

        Ok(VaultMetadata {
            format_version: Self::meta_value(&conn, "format_version")?,
            vault_id: self.vault_id,
            created_at: parse_ts(&Self::meta_value(&conn, "created_at")?, "created_at")?,
            last_modified: parse_ts(&Self::meta_value(&conn, "last_modified")?, "last_modified")?,
        })
    }

    fn next_capsule_id(&self, owner: &BtcAddress) -> Result<CapsuleId> {
        let conn = self.lock_conn()?;
        Self::count_capsules(&conn, owner)
    }

    fn insert_capsule(&self, capsule: &Capsule) -> Result<()> {
        if capsule.unlocked.is_some() {
            return Err(CapsuleError::Invariant(
                "New capsules must be locked".to_string(),
            ));
        }

        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let expected = Self::count_capsules(&tx, &capsule.owner)?;
        if capsule.id != expected {
            return Err(CapsuleError::Invariant(format!(
                "Capsule index {} out of sequence (expected {})",
                capsule.id, expected
            )));
        }

        let delay_secs = i64::try_from(capsule.unlock_delay.as_secs())
            .map_err(|_| CapsuleError::InvalidInput("Unlock delay too long".to_string()))?;

        tx.execute(
            r#"
            INSERT INTO capsules (
                owner,
                idx,
                nonce,
                ciphertext,
                created_at,
                unlock_delay_secs,
                unlock_time,
                status
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, 'locked')
            "#,
            (
                capsule.owner.as_str(),
                i64::from(capsule.id.index()),
                capsule.sealed.nonce.as_slice(),
                capsule.sealed.ciphertext.as_slice(),
                format_ts(&capsule.created_at),
                delay_secs,
                format_ts(&capsule.unlock_time),
            ),
        )?;

        Self::touch(&tx)?;
        tx.commit()?;
        Ok(())
    }

    fn get_capsule(&self, owner: &BtcAddress, id: CapsuleId) -> Result<Option<Capsule>> {
        let conn = self.lock_conn()?;

        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM capsules WHERE owner = ? AND idx = ?",
                    CAPSULE_COLUMNS
                ),
                (owner.as_str(), i64::from(id.index())),
                CapsuleRow::from_row,
            )
            .optional()?;

        row.map(Capsule::try_from).transpose()
    }

    fn list_capsules(&self, owner: &BtcAddress) -> Result<Vec<Capsule>> {
        let conn = self.lock_conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM capsules WHERE owner = ? ORDER BY idx ASC",
            CAPSULE_COLUMNS
        ))?;
        let rows = stmt.query_map([owner.as_str()], CapsuleRow::from_row)?;

        let mut capsules = Vec::new();
        for row in rows {
            capsules.push(Capsule::try_from(row?)?);
        }
        Ok(capsules)
    }

    fn record_unlock(
        &self,
        owner: &BtcAddress,
        id: CapsuleId,
        record: &UnlockRecord,
        spent_challenges: &[Uuid],
    ) -> Result<bool> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let status: Option<String> = tx
            .query_row(
                "SELECT status FROM capsules WHERE owner = ? AND idx = ?",
                (owner.as_str(), i64::from(id.index())),
                |row| row.get(0),
            )
            .optional()?;
        match status.as_deref() {
            None => return Err(CapsuleError::NotFound(format!("Capsule {}", id))),
            Some("unlocked") => return Ok(false),
            Some(_) => {}
        }

        Self::spend_challenges(&tx, spent_challenges, &record.unlocked_at)?;

        let attestations_json = if record.attestations.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&record.attestations)?)
        };
        let changed = tx.execute(
            r#"
            UPDATE capsules
            SET status = 'unlocked', unlocked_at = ?, unlock_method = ?, attestations_json = ?
            WHERE owner = ? AND idx = ? AND status = 'locked'
            "#,
            (
                format_ts(&record.unlocked_at),
                record.method.as_str(),
                attestations_json,
                owner.as_str(),
                i64::from(id.index()),
            ),
        )?;
        if changed != 1 {
            return Err(CapsuleError::Invariant(format!(
                "Capsule {} changed during unlock",
                id
            )));
        }

        Self::touch(&tx)?;
        tx.commit()?;
        Ok(true)
    }

    fn insert_guardian(
        &self,
        owner: &BtcAddress,
        guardian: &BtcAddress,
        added_at: DateTime<Utc>,
    ) -> Result<()> {
        if owner == guardian {
            return Err(CapsuleError::InvalidGuardian(
                "An owner cannot be their own guardian".to_string(),
            ));
        }

        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let trusted: Option<bool> = tx
            .query_row(
                "SELECT trusted FROM guardians WHERE owner = ? AND guardian = ?",
                [owner.as_str(), guardian.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        match trusted {
            Some(true) => return Err(CapsuleError::DuplicateGuardian(guardian.to_string())),
            Some(false) => {
                tx.execute(
                    "UPDATE guardians SET trusted = 1 WHERE owner = ? AND guardian = ?",
                    [owner.as_str(), guardian.as_str()],
                )?;
            }
            None => {
                tx.execute(
                    "INSERT INTO guardians (owner, guardian, trusted, added_at) VALUES (?, ?, 1, ?)",
                    (owner.as_str(), guardian.as_str(), format_ts(&added_at)),
                )?;
            }
        }

        Self::touch(&tx)?;
        tx.commit()?;
        Ok(())
    }

    fn list_guardians(&self, owner: &BtcAddress) -> Result<Vec<Guardian>> {
        let conn = self.lock_conn()?;

        let mut stmt = conn.prepare(
            "SELECT guardian, trusted, added_at FROM guardians WHERE owner = ? ORDER BY rowid ASC",
        )?;
        let rows = stmt.query_map([owner.as_str()], |row| {
            Ok(GuardianRow {
                guardian: row.get(0)?,
                trusted: row.get(1)?,
                added_at: row.get(2)?,
            })
        })?;

        let mut guardians = Vec::new();
        for row in rows {
            guardians.push(Guardian::try_from(row?)?);
        }
        Ok(guardians)
    }

    fn revoke_guardian(&self, owner: &BtcAddress, guardian: &BtcAddress) -> Result<bool> {
        let conn = self.lock_conn()?;
        let changed = conn.execute(
            "UPDATE guardians SET trusted = 0 WHERE owner = ? AND guardian = ? AND trusted = 1",
            [owner.as_str(), guardian.as_str()],
        )?;
        if changed > 0 {
            Self::touch(&conn)?;
        }
        Ok(changed > 0)
    }

    fn insert_challenge(&self, challenge: &Challenge) -> Result<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            r#"
            INSERT INTO challenges (id, address, purpose_json, nonce, issued_at, expires_at, consumed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
            (
                challenge.id.to_string(),
                challenge.address.as_str(),
                purpose_to_json(&challenge.purpose)?,
                &challenge.nonce,
                format_ts(&challenge.issued_at),
                format_ts(&challenge.expires_at),
                challenge.consumed_at.as_ref().map(format_ts),
            ),
        )?;
        Ok(())
    }

    fn get_challenge(&self, id: &Uuid) -> Result<Option<Challenge>> {
        let conn = self.lock_conn()?;

        let row = conn
            .query_row(
                r#"
                SELECT id, address, purpose_json, nonce, issued_at, expires_at, consumed_at
                FROM challenges
                WHERE id = ?
                "#,
                [id.to_string()],
                |row| {
                    Ok(ChallengeRow {
                        id: row.get(0)?,
                        address: row.get(1)?,
                        purpose_json: row.get(2)?,
                        nonce: row.get(3)?,
                        issued_at: row.get(4)?,
                        expires_at: row.get(5)?,
                        consumed_at: row.get(6)?,
                    })
                },
            )
            .optional()?;

        row.map(Challenge::try_from).transpose()
    }

    fn consume_challenges(&self, ids: &[Uuid], at: DateTime<Utc>) -> Result<()> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        Self::spend_challenges(&tx, ids, &at)?;
        tx.commit()?;
        Ok(())
    }

    fn prune_challenges(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.lock_conn()?;
        let removed = conn.execute(
            "DELETE FROM challenges WHERE expires_at < ?",
            [format_ts(&cutoff)],
        )?;
        Ok(removed)
    }

    fn check_integrity(&self) -> Result<()> {
        let conn = self.lock_conn()?;

        let sqlite_check: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        if sqlite_check != "ok" {
            return Err(CapsuleError::Invariant(format!(
                "SQLite integrity check failed: {}",
                sqlite_check
            )));
        }

        let gapped_owners: i64 = conn.query_row(
            "SELECT COUNT(*) FROM (SELECT owner FROM capsules GROUP BY owner HAVING MAX(idx) + 1 != COUNT(*))",
            [],
            |row| row.get(0),
        )?;
        if gapped_owners > 0 {
            return Err(CapsuleError::Invariant(
                "Capsule indices are not contiguous".to_string(),
            ));
        }

        let mut stmt = conn.prepare(&format!("SELECT {} FROM capsules", CAPSULE_COLUMNS))?;
        let rows = stmt.query_map([], CapsuleRow::from_row)?;
        for row in rows {
            let capsule = Capsule::try_from(row?)?;
            if capsule.unlock_time != capsule.created_at + capsule.unlock_delay.duration() {
                return Err(CapsuleError::Invariant(format!(
                    "Capsule {} of {} has a modified unlock time",
                    capsule.id, capsule.owner
                )));
            }
        }

        let self_loops: i64 = conn.query_row(
            "SELECT COUNT(*) FROM guardians WHERE owner = guardian",
            [],
            |row| row.get(0),
        )?;
        if self_loops > 0 {
            return Err(CapsuleError::Invariant(
                "Owner registered as their own guardian".to_string(),
            ));
        }

        let placeholders = vec!["?"; REQUIRED_META_KEYS.len()].join(", ");
        let metadata_count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM meta WHERE key IN ({})", placeholders),
            rusqlite::params_from_iter(REQUIRED_META_KEYS.iter()),
            |row| row.get(0),
        )?;
        if metadata_count < REQUIRED_META_KEYS.len() as i64 {
            return Err(CapsuleError::Invariant(
                "Metadata table missing required keys".to_string(),
            ));
        }

        Ok(())
    }
}
