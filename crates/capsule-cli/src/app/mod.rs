//! Application-level utilities for the Capsule CLI.
//!
//! This module provides:
//! - Path resolution for config and vault files
//! - Passphrase handling with retry logic
//! - The open vault and the session it runs under

mod context;
mod passphrase;
mod resolver;
mod vault;

// Re-export public API
pub use context::AppContext;
pub use passphrase::open_storage_with_retry;
pub use resolver::resolve_config_path;
pub use vault::Vault;
