//! Provider-qualified resource type strings.
//!
//! Types are compared case-insensitively everywhere; use [`type_matches`]
//! instead of `==`.

pub const VIRTUAL_NETWORK: &str = "Microsoft.Network/virtualNetworks";
pub const PRIVATE_ENDPOINT: &str = "Microsoft.Network/privateEndpoints";
pub const PRIVATE_DNS_ZONE: &str = "Microsoft.Network/privateDnsZones";
pub const VIRTUAL_NETWORK_LINK: &str = "Microsoft.Network/privateDnsZones/virtualNetworkLinks";
pub const POSTGRES_FLEXIBLE_SERVER: &str = "Microsoft.DBforPostgreSQL/flexibleServers";
pub const LOG_ANALYTICS_WORKSPACE: &str = "Microsoft.OperationalInsights/workspaces";
pub const LOG_ANALYTICS_DATA_EXPORT: &str = "Microsoft.OperationalInsights/workspaces/dataExports";
pub const SOLUTION: &str = "Microsoft.OperationsManagement/solutions";
pub const SENTINEL_ONBOARDING: &str = "Microsoft.SecurityInsights/onboardingStates";
pub const SENTINEL_ALERT_RULE: &str = "Microsoft.SecurityInsights/alertRules";
pub const DIAGNOSTIC_SETTING: &str = "Microsoft.Insights/diagnosticSettings";
pub const STORAGE_ACCOUNT: &str = "Microsoft.Storage/storageAccounts";
pub const BATCH_ACCOUNT: &str = "Microsoft.Batch/batchAccounts";

pub fn type_matches(left: &str, right: &str) -> bool {
    left.eq_ignore_ascii_case(right)
}
