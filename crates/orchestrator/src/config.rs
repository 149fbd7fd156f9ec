use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Poll cadence for awaiting a nested flight: 5s x 360 cycles, about 30
/// minutes. The resources flight takes about 10 minutes on the happy path and
/// up to three times that when it has to roll back.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_POLL_CYCLES: u32 = 360;

/// Orchestrator tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub poll_interval_secs: u64,
    pub poll_cycles: u32,
    pub protected_data: ProtectedDataConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            poll_cycles: DEFAULT_POLL_CYCLES,
            protected_data: ProtectedDataConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_secs = interval.as_secs();
        self
    }

    pub fn with_poll_cycles(mut self, cycles: u32) -> Self {
        self.poll_cycles = cycles;
        self
    }

    pub fn with_protected_data(mut self, protected_data: ProtectedDataConfig) -> Self {
        self.protected_data = protected_data;
        self
    }
}

/// Settings only the protected-data profile reads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtectedDataConfig {
    /// Region to long-term log storage account id
    pub long_term_storage_accounts: BTreeMap<String, String>,
    /// Workspace tables exported to long-term storage
    pub log_tables: Vec<String>,
    /// Sentinel scheduled alert rule templates to enable
    pub alert_rules: Vec<String>,
}

impl Default for ProtectedDataConfig {
    fn default() -> Self {
        Self {
            long_term_storage_accounts: BTreeMap::new(),
            log_tables: vec![
                "AzureActivity".to_string(),
                "AzureDiagnostics".to_string(),
                "SecurityEvent".to_string(),
            ],
            alert_rules: vec![
                "brute-force-attack".to_string(),
                "mass-data-download".to_string(),
            ],
        }
    }
}

impl ProtectedDataConfig {
    pub fn storage_account_for(&self, region: &str) -> Option<&str> {
        self.long_term_storage_accounts
            .iter()
            .find(|(r, _)| r.eq_ignore_ascii_case(region))
            .map(|(_, account)| account.as_str())
    }

    pub fn with_storage_account(
        mut self,
        region: impl Into<String>,
        account_id: impl Into<String>,
    ) -> Self {
        self.long_term_storage_accounts
            .insert(region.into(), account_id.into());
        self
    }
}
