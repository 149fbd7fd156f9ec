use std::path::Path;
use std::sync::Arc;

use cloud::{InMemoryResourceManager, ResourceManager, RestConfig, RestResourceManager};
use orchestrator::OrchestratorConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

pub const DEFAULT_CONFIG_FILE: &str = "landing-zone.toml";
pub const DEFAULT_PORT: u16 = 3001;
pub const DEFAULT_DATABASE_URL: &str = "sqlite:landing-zone.db";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Service configuration, read from `landing-zone.toml`.
///
/// Every field has a default, so an empty or missing file yields a working
/// local setup with the in-memory provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub provider: ProviderConfig,
    pub orchestrator: OrchestratorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: DEFAULT_PORT }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Process-local resources, lost on restart
    #[default]
    Memory,
    /// ARM-style management REST API
    Rest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub base_url: String,
    pub api_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        let rest = RestConfig::default();
        Self {
            kind: ProviderKind::default(),
            base_url: rest.base_url,
            api_version: rest.api_version,
            token: None,
        }
    }
}

impl ProviderConfig {
    pub fn build(&self) -> Arc<dyn ResourceManager> {
        match self.kind {
            ProviderKind::Memory => {
                info!("Using in-memory cloud provider");
                Arc::new(InMemoryResourceManager::new().with_sentinel_solutions())
            }
            ProviderKind::Rest => {
                info!(base_url = %self.base_url, api_version = %self.api_version, "Using REST cloud provider");
                Arc::new(RestResourceManager::new(RestConfig {
                    base_url: self.base_url.clone(),
                    api_version: self.api_version.clone(),
                    token: self.token.clone(),
                    ..RestConfig::default()
                }))
            }
        }
    }
}

impl ServiceConfig {
    /// Loads the file at `path`; a missing file means all defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file does not exist, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        debug!(path = %path.display(), "Config loaded");
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let config = ServiceConfig::load(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.database.url, DEFAULT_DATABASE_URL);
        assert_eq!(config.provider.kind, ProviderKind::Memory);
        assert_eq!(config.orchestrator.poll_interval_secs, 5);
        assert_eq!(config.orchestrator.poll_cycles, 360);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("landing-zone.toml");
        std::fs::write(
            &path,
            r#"
[server]
port = 8080

[provider]
kind = "rest"
token = "secret"

[orchestrator]
poll_interval_secs = 2

[orchestrator.protected_data.long_term_storage_accounts]
eastus = "/subscriptions/s/resourceGroups/logs/providers/Microsoft.Storage/storageAccounts/lt"
"#,
        )
        .unwrap();

        let config = ServiceConfig::load(&path).unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.database.url, DEFAULT_DATABASE_URL);
        assert_eq!(config.provider.kind, ProviderKind::Rest);
        assert_eq!(config.provider.token.as_deref(), Some("secret"));
        assert_eq!(config.provider.base_url, "https://management.azure.com");
        assert_eq!(config.orchestrator.poll_interval_secs, 2);
        assert_eq!(config.orchestrator.poll_cycles, 360);
        assert!(config
            .orchestrator
            .protected_data
            .storage_account_for("eastus")
            .is_some());
        assert!(!config.orchestrator.protected_data.alert_rules.is_empty());
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("landing-zone.toml");
        std::fs::write(&path, "[server]\nport = \"not a number\"\n").unwrap();

        assert!(matches!(
            ServiceConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_written_defaults_load_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("landing-zone.toml");
        std::fs::write(&path, ServiceConfig::default().to_toml().unwrap()).unwrap();

        let config = ServiceConfig::load(&path).unwrap();
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.orchestrator.protected_data.log_tables.len(), 3);
    }
}
