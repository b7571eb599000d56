//! Bitcoin address validation.

use std::fmt;

use bitcoin::address::NetworkUnchecked;
use bitcoin::Address;
use serde::Serialize;

use crate::config::ChainNetwork;
use crate::error::VerificationFailure;

/// A Bitcoin address validated for one network, held in canonical form.
///
/// Canonical form is the address's own display form, so bech32 addresses are
/// lower-cased and equality is plain string equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct BtcAddress(String);

impl BtcAddress {
    /// Validate `raw` as an address on `network`.
    pub fn parse(raw: &str, network: ChainNetwork) -> Result<Self, VerificationFailure> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(VerificationFailure::InvalidAddress(
                "address is empty".to_string(),
            ));
        }

        let unchecked: Address<NetworkUnchecked> = trimmed
            .parse()
            .map_err(|e| VerificationFailure::InvalidAddress(format!("{}: {}", trimmed, e)))?;
        let checked = unchecked
            .require_network(network.to_bitcoin())
            .map_err(|_| {
                VerificationFailure::InvalidAddress(format!(
                    "{} is not a {} address",
                    trimmed,
                    network.as_str()
                ))
            })?;

        Ok(Self(checked.to_string()))
    }

    /// Rebuild an address that was validated before it was stored.
    pub(crate) fn from_trusted(canonical: String) -> Self {
        Self(canonical)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The checked `bitcoin` address, for signature verification.
    pub(crate) fn to_bitcoin(&self) -> Result<Address, VerificationFailure> {
        self.0
            .parse::<Address<NetworkUnchecked>>()
            .map(Address::assume_checked)
            .map_err(|e| VerificationFailure::InvalidAddress(format!("{}: {}", self.0, e)))
    }
}

impl fmt::Display for BtcAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
