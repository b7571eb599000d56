//! Input and parsing helper functions for the CLI.
//!
//! This module provides utilities for:
//! - Passphrase prompting and capsule message reading (`input`)
//! - Capsule index and attestation parsing (`parsing`)

mod input;
mod parsing;

// Re-export public API
pub use input::{prompt_init_passphrase, prompt_passphrase, read_message};
pub use parsing::{parse_attestation, parse_capsule_index};
