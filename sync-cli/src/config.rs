//! Configuration management for ledger-sync.
//!
//! Settings live in an optional `config.toml` inside the data directory.
//! Every key has a default, so a missing file or a partial file is fine.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use ledger_sync_client::{SyncConfig, DEFAULT_TOPIC_PREFIX};
use ledger_sync_core::{DEFAULT_CURRENCY, DEFAULT_RELAY_ADDRESS};

/// File name of the configuration inside the data directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Full application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Defaults for new ledgers and transactions.
    pub ledger: LedgerSection,
    /// Channel naming shared with the devices this one syncs with.
    pub sync: SyncSection,
}

/// `[ledger]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSection {
    /// Broker address written into newly created ledgers.
    pub relay_address: String,
    /// Currency of new transactions.
    pub default_currency: String,
}

impl Default for LedgerSection {
    fn default() -> Self {
        Self {
            relay_address: DEFAULT_RELAY_ADDRESS.to_string(),
            default_currency: DEFAULT_CURRENCY.to_string(),
        }
    }
}

/// `[sync]` section.
///
/// The CLI works on the local store only; these settings name the broker
/// topics that `show` reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSection {
    /// First topic segment.
    pub topic_prefix: String,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            topic_prefix: DEFAULT_TOPIC_PREFIX.to_string(),
        }
    }
}

impl CliConfig {
    /// Load configuration from a data directory. A missing file yields the
    /// defaults.
    pub async fn load(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()))
            }
        };
        toml::from_str(&contents).with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    /// Save configuration to a data directory.
    pub async fn save(&self, data_dir: &Path) -> Result<()> {
        let path = data_dir.join(CONFIG_FILE);
        let contents = toml::to_string_pretty(self).context("Failed to encode configuration")?;
        tokio::fs::write(&path, contents)
            .await
            .context("Failed to save configuration")?;
        Ok(())
    }

    /// Settings for the sync engine.
    pub fn sync_config(&self) -> SyncConfig {
        SyncConfig::default().with_topic_prefix(&self.sync.topic_prefix)
    }
}

/// Set directory permissions to 0700 (owner only) on Unix.
/// No-op on non-Unix platforms.
pub async fn set_dir_permissions_0700(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
            .await
            .context("Failed to set directory permissions")?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = CliConfig::load(dir.path()).await.unwrap();
        assert_eq!(config, CliConfig::default());
        assert_eq!(config.ledger.default_currency, "EUR");
        assert_eq!(config.sync_config(), SyncConfig::default());
    }

    #[tokio::test]
    async fn partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        tokio::fs::write(
            dir.path().join(CONFIG_FILE),
            "[ledger]\ndefault_currency = \"CHF\"\n\n[sync]\ntopic_prefix = \"flat\"\n",
        )
        .await
        .unwrap();

        let config = CliConfig::load(dir.path()).await.unwrap();
        assert_eq!(config.ledger.default_currency, "CHF");
        assert_eq!(config.ledger.relay_address, DEFAULT_RELAY_ADDRESS);
        assert_eq!(config.sync.topic_prefix, "flat");
        assert_eq!(config.sync_config().topic_prefix, "flat");
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempdir().unwrap();
        let mut config = CliConfig::default();
        config.ledger.relay_address = "wss://broker.example".into();
        config.sync.topic_prefix = "test".into();
        config.save(dir.path()).await.unwrap();

        assert_eq!(CliConfig::load(dir.path()).await.unwrap(), config);
    }

    #[tokio::test]
    async fn invalid_file_is_an_error() {
        let dir = tempdir().unwrap();
        tokio::fs::write(dir.path().join(CONFIG_FILE), "[sync\n").await.unwrap();
        assert!(CliConfig::load(dir.path()).await.is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn data_dir_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempdir().unwrap();
        let data_dir = dir.path().join("test-data");
        tokio::fs::create_dir_all(&data_dir).await.unwrap();
        set_dir_permissions_0700(&data_dir).await.unwrap();

        let perms = tokio::fs::metadata(&data_dir).await.unwrap().permissions();
        assert_eq!(perms.mode() & 0o777, 0o700, "dir should be 0700");
    }
}
