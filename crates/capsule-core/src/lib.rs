//! # Capsule Core
//!
//! Core library for Capsule - time-locked encrypted messages gated by proof of
//! Bitcoin address ownership, with guardian-quorum emergency unlock.
//!
//! This crate provides the domain logic, storage abstractions, and data models
//! independent of the CLI interface.
//!
//! ## Architecture
//!
//! - **identity**: Challenges, signature verification, sessions
//! - **guardians**: Per-owner trusted guardian registry
//! - **store**: Capsule persistence over a storage engine
//! - **unlock**: Sealing, opening, and time/quorum unlock rules
//! - **service**: The operations front ends call
//! - **request**: Tagged request/response boundary
//! - **storage**: Storage engine trait and implementations

pub mod capsule;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod error;
pub(crate) mod fs;
pub mod guardians;
pub mod identity;
pub mod request;
pub mod service;
pub mod storage;
pub mod store;
pub mod unlock;

#[cfg(test)]
pub(crate) mod test_support;

pub use capsule::{CapsuleId, CapsuleReceipt, CapsuleStatus, CapsuleSummary, UnlockDelay};
pub use config::{ChainNetwork, VaultConfig};
pub use error::{CapsuleError, ErrorClass, Result, VerificationFailure};
pub use request::{Request, Response};
#[cfg(any(test, feature = "test-support"))]
pub use service::TestMode;
pub use service::CapsuleService;
pub use storage::{AgeSqliteStorage, MemoryStorage, StorageEngine};
pub use unlock::QuorumPolicy;

/// Core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
