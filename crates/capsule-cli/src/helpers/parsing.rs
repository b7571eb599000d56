//! Parsing helpers for capsule indices and guardian attestations.

use capsule_core::request::AttestationInput;
use capsule_core::CapsuleId;

use crate::errors::CliError;

/// Parse `3` or `#3`.
pub fn parse_capsule_index(value: &str) -> Result<CapsuleId, CliError> {
    value.parse::<CapsuleId>().map_err(CliError::from)
}

/// Parse `ADDRESS:CHALLENGE_ID:SIGNATURE`.
///
/// Addresses, UUIDs and base64 never contain `:`, so the split is unambiguous.
pub fn parse_attestation(value: &str) -> Result<AttestationInput, CliError> {
    let mut parts = value.trim().splitn(3, ':');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(guardian), Some(challenge_id), Some(signature))
            if !guardian.is_empty() && !challenge_id.is_empty() && !signature.is_empty() =>
        {
            Ok(AttestationInput {
                guardian: guardian.to_string(),
                challenge_id: challenge_id.to_string(),
                signature: signature.to_string(),
            })
        }
        _ => Err(CliError::invalid_input(format!(
            "Invalid attestation: {} (expected ADDRESS:CHALLENGE_ID:SIGNATURE)",
            value
        ))),
    }
}
