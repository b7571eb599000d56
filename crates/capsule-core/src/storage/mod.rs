//! Storage abstraction for capsule vaults.
//!
//! This module defines the `StorageEngine` trait and the records it stores.
//!
//! ## Backends
//!
//! - `MemoryStorage`: process-lifetime tables, used by library callers and tests
//! - `AgeSqliteStorage`: in-memory SQLite serialized to an age-encrypted file
//!
//! ## Security
//!
//! Storage engines are responsible for:
//! - Encryption at rest for anything written to disk
//! - Atomic writes to prevent corruption
//! - Refusing status reversals and schedule changes
//!
//! Capsule payloads arrive already sealed; engines never see plaintext.

mod age_sqlite;
pub mod encryption;
mod memory;
mod traits;
pub mod types;

pub use age_sqlite::{AgeSqliteStorage, FORMAT_VERSION};
pub use memory::MemoryStorage;
pub use traits::StorageEngine;
pub use types::{Guardian, VaultMetadata};
