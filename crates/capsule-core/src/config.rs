//! Vault policy configuration.
//!
//! These values shape verification and unlock policy. The CLI reads them from
//! the `[policy]` table of its config file; library users construct them
//! directly or start from [`VaultConfig::default`].

use bitcoin::Network;
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::unlock::QuorumPolicy;

/// Default lifetime of an issued challenge.
pub const DEFAULT_CHALLENGE_TTL_SECS: u64 = 300;

/// Default lifetime of a verified session.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 3600;

/// Default ceiling on capsule message size.
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 64 * 1024;

/// Bitcoin network that addresses must belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainNetwork {
    #[default]
    Bitcoin,
    Testnet,
    Signet,
    Regtest,
}

impl ChainNetwork {
    pub fn as_str(self) -> &'static str {
        match self {
            ChainNetwork::Bitcoin => "bitcoin",
            ChainNetwork::Testnet => "testnet",
            ChainNetwork::Signet => "signet",
            ChainNetwork::Regtest => "regtest",
        }
    }

    pub fn to_bitcoin(self) -> Network {
        match self {
            ChainNetwork::Bitcoin => Network::Bitcoin,
            ChainNetwork::Testnet => Network::Testnet,
            ChainNetwork::Signet => Network::Signet,
            ChainNetwork::Regtest => Network::Regtest,
        }
    }
}

/// Policy knobs for one vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Network addresses are validated against
    pub network: ChainNetwork,

    /// Guardian quorum needed for emergency unlock
    pub quorum: QuorumPolicy,

    /// Seconds an issued challenge stays valid
    pub challenge_ttl_secs: u64,

    /// Seconds a verified session stays valid
    pub session_ttl_secs: u64,

    /// Accept any positive delay instead of only 1d/7d/30d
    pub allow_custom_delays: bool,

    /// Maximum plaintext bytes per capsule
    pub max_message_bytes: usize,

    /// Enables the test-mode unlock bypass (only in builds that compile it)
    pub test_mode: bool,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            network: ChainNetwork::default(),
            quorum: QuorumPolicy::default(),
            challenge_ttl_secs: DEFAULT_CHALLENGE_TTL_SECS,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            allow_custom_delays: false,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            test_mode: false,
        }
    }
}

impl VaultConfig {
    pub fn challenge_ttl(&self) -> Duration {
        seconds(self.challenge_ttl_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        seconds(self.session_ttl_secs)
    }
}

// chrono panics above i64::MAX / 1000 seconds.
fn seconds(value: u64) -> Duration {
    let capped = i64::try_from(value).unwrap_or(i64::MAX).min(i64::MAX / 1000);
    Duration::seconds(capped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = VaultConfig::default();
        assert_eq!(config.network, ChainNetwork::Bitcoin);
        assert_eq!(config.quorum, QuorumPolicy::Majority);
        assert_eq!(config.challenge_ttl(), Duration::minutes(5));
        assert!(!config.allow_custom_delays);
        assert!(!config.test_mode);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: VaultConfig =
            serde_json::from_str(r#"{"network":"regtest","quorum":{"kind":"all"}}"#).unwrap();
        assert_eq!(config.network, ChainNetwork::Regtest);
        assert_eq!(config.quorum, QuorumPolicy::All);
        assert_eq!(config.session_ttl_secs, DEFAULT_SESSION_TTL_SECS);
    }
}
