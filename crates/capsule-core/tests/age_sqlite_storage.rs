mod common;

use std::fs;

use chrono::Duration;
use tempfile::TempDir;

use capsule_core::storage::{AgeSqliteStorage, StorageEngine, FORMAT_VERSION};
use capsule_core::{CapsuleError, CapsuleId, CapsuleStatus, UnlockDelay, VaultConfig, VerificationFailure};
use common::{attest, cheap_kdf, login, service_at, TestWallet, PASSPHRASE};

fn vault_path(dir: &TempDir) -> std::path::PathBuf {
    dir.path().join("vault.capsule")
}

#[test]
fn test_create_open_close_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = vault_path(&dir);

    let vault_id = AgeSqliteStorage::create(&path, PASSPHRASE, &cheap_kdf())
        .expect("create should succeed");
    assert!(!vault_id.is_nil());
    assert!(path.exists());

    let storage = AgeSqliteStorage::open(&path, PASSPHRASE).expect("open should succeed");
    let metadata = storage.metadata().unwrap();
    assert_eq!(metadata.vault_id, vault_id);
    assert_eq!(metadata.format_version, FORMAT_VERSION);
    storage.check_integrity().unwrap();
    storage.close(PASSPHRASE).expect("close should succeed");

    let on_disk = fs::read(&path).expect("read should succeed");
    assert!(!on_disk.is_empty());
    assert!(!on_disk.windows(6).any(|w| w == b"SQLite"));
}

#[test]
fn test_open_wrong_passphrase_fails() {
    let dir = TempDir::new().unwrap();
    let path = vault_path(&dir);
    AgeSqliteStorage::create(&path, "correct-passphrase-123", &cheap_kdf()).unwrap();

    let result = AgeSqliteStorage::open(&path, "wrong-passphrase-456");
    assert!(matches!(result, Err(CapsuleError::IncorrectPassphrase)));
}

#[test]
fn test_open_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    let result = AgeSqliteStorage::open(&vault_path(&dir), PASSPHRASE);
    assert!(matches!(result, Err(CapsuleError::VaultNotFound)));
}

#[test]
fn test_create_refuses_existing_file() {
    let dir = TempDir::new().unwrap();
    let path = vault_path(&dir);
    AgeSqliteStorage::create(&path, PASSPHRASE, &cheap_kdf()).unwrap();

    let again = AgeSqliteStorage::create(&path, PASSPHRASE, &cheap_kdf());
    assert!(matches!(again, Err(CapsuleError::Storage(_))));
}

#[test]
fn test_create_rejects_short_passphrase() {
    let dir = TempDir::new().unwrap();
    let path = vault_path(&dir);
    let result = AgeSqliteStorage::create(&path, "short", &cheap_kdf());
    assert!(matches!(result, Err(CapsuleError::InvalidInput(_))));
    assert!(!path.exists());
}

#[test]
fn test_state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = vault_path(&dir);
    AgeSqliteStorage::create(&path, PASSPHRASE, &cheap_kdf()).unwrap();

    let owner = TestWallet::new(1);
    let guardian = TestWallet::new(2);
    let owner_addr = owner.address();

    let storage = AgeSqliteStorage::open(&path, PASSPHRASE).unwrap();
    let master = storage.master_key(PASSPHRASE).unwrap();
    let (service, _clock) = service_at(storage, master, VaultConfig::default());
    let token = login(&service, &owner);
    service.add_guardian(&token, guardian.address().as_str()).unwrap();
    let first = service
        .create_capsule(&token, b"kept", UnlockDelay::OneDay)
        .unwrap();
    service
        .create_capsule(&token, b"opened early", UnlockDelay::SevenDays)
        .unwrap();
    let spent = attest(&service, &guardian, &owner_addr, CapsuleId::new(1));
    service
        .guardian_unlock(&token, owner_addr.as_str(), CapsuleId::new(1), &[spent.clone()])
        .unwrap();
    service.into_storage().close(PASSPHRASE).unwrap();

    let storage = AgeSqliteStorage::open(&path, PASSPHRASE).unwrap();
    storage.check_integrity().unwrap();
    let capsules = storage.list_capsules(&owner_addr).unwrap();
    assert_eq!(capsules.len(), 2);
    assert_eq!(capsules[0].unlock_time, first.unlock_time);
    assert_eq!(capsules[0].status(), CapsuleStatus::Locked);
    assert_eq!(capsules[1].status(), CapsuleStatus::Unlocked);
    let guardians = storage.list_guardians(&owner_addr).unwrap();
    assert_eq!(guardians.len(), 1);
    assert_eq!(guardians[0].address, guardian.address());
    assert!(storage.get_challenge(&spent.challenge_id).unwrap().unwrap().consumed_at.is_some());

    let master = storage.master_key(PASSPHRASE).unwrap();
    let (service, clock) = service_at(storage, master, VaultConfig::default());
    clock.advance(Duration::days(1));
    let token = login(&service, &owner);
    let opened = service.unlock_capsule(&token, CapsuleId::new(0)).unwrap();
    assert_eq!(opened.as_slice(), b"kept");
    let reopened = service.unlock_capsule(&token, CapsuleId::new(1)).unwrap();
    assert_eq!(reopened.as_slice(), b"opened early");

    // A spent attestation stays spent across reopen.
    service
        .create_capsule(&token, b"third", UnlockDelay::OneDay)
        .unwrap();
    let replay = service.guardian_unlock(&token, owner_addr.as_str(), CapsuleId::new(2), &[spent]);
    assert!(matches!(
        replay,
        Err(CapsuleError::Verification(VerificationFailure::ReplayedChallenge))
    ));
}
