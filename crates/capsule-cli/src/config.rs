use std::path::{Path, PathBuf};

use capsule_core::crypto::KdfParams;
use capsule_core::VaultConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct CapsuleConfig {
    pub vault: VaultSection,
    #[serde(default)]
    pub policy: VaultConfig,
    #[serde(default)]
    pub kdf: KdfParams,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VaultSection {
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct LoggingSection {
    /// Default filter directive, e.g. "info" or "capsule_core=debug"
    pub level: Option<String>,
    #[serde(default)]
    pub json: bool,
}

impl CapsuleConfig {
    pub fn new(vault_path: PathBuf) -> Self {
        Self {
            vault: VaultSection {
                path: vault_path.to_string_lossy().to_string(),
            },
            policy: VaultConfig::default(),
            kdf: KdfParams::default(),
            logging: LoggingSection::default(),
        }
    }
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_config_dir()?.join("config.toml"))
}

pub fn default_vault_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_data_dir()?.join("vault.capsule"))
}

pub fn read_config(path: &Path) -> anyhow::Result<CapsuleConfig> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
    toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("Failed to parse config {}: {}", path.display(), e))
}

pub fn write_config(path: &Path, config: &CapsuleConfig) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            anyhow::anyhow!(
                "Failed to create config directory {}: {}",
                parent.display(),
                e
            )
        })?;
    }
    let contents =
        toml::to_string_pretty(config).map_err(|e| anyhow::anyhow!("TOML error: {}", e))?;
    std::fs::write(path, contents)
        .map_err(|e| anyhow::anyhow!("Failed to write config {}: {}", path.display(), e))?;
    Ok(())
}

pub fn xdg_config_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_CONFIG_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("capsule"));
        }
    }
    Ok(home_dir()?.join(".config").join("capsule"))
}

pub fn xdg_data_dir() -> anyhow::Result<PathBuf> {
    if let Ok(value) = std::env::var("XDG_DATA_HOME") {
        if !value.trim().is_empty() {
            return Ok(PathBuf::from(value).join("capsule"));
        }
    }
    Ok(home_dir()?.join(".local").join("share").join("capsule"))
}

fn home_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| anyhow::anyhow!("HOME is not set; cannot resolve default paths"))?;
    Ok(PathBuf::from(home))
}

#[cfg(test)]
mod tests {
    use super::*;
    use capsule_core::QuorumPolicy;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: CapsuleConfig = toml::from_str("[vault]\npath = \"/tmp/v.capsule\"\n").unwrap();
        assert_eq!(config.vault.path, "/tmp/v.capsule");
        assert_eq!(config.policy, VaultConfig::default());
        assert_eq!(config.kdf, KdfParams::default());
        assert!(!config.logging.json);
    }

    #[test]
    fn test_policy_section() {
        let contents = r#"
[vault]
path = "/tmp/v.capsule"

[policy]
network = "testnet"
allow_custom_delays = true
quorum = { kind = "at_least", count = 2 }

[kdf]
memory_kib = 1024
iterations = 1
parallelism = 1
"#;
        let config: CapsuleConfig = toml::from_str(contents).unwrap();
        assert!(config.policy.allow_custom_delays);
        assert_eq!(config.policy.quorum, QuorumPolicy::AtLeast { count: 2 });
        assert_eq!(config.kdf.memory_kib, 1024);
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        write_config(&path, &CapsuleConfig::new(PathBuf::from("/tmp/x.capsule"))).unwrap();
        let config = read_config(&path).unwrap();
        assert_eq!(config.vault.path, "/tmp/x.capsule");
    }
}
