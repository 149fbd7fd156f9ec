use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use cloud::ResourceManager;
use landing_zone_core::resource_types;
use landing_zone_core::ManagedResource;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::plan::ResourceToDelete;
use crate::error::Result;

/// Why one resource cannot be deleted right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Violation {
    pub resource_id: String,
    pub resource_type: String,
    pub rule: String,
    pub reason: String,
}

impl Violation {
    pub fn new(
        resource_id: impl Into<String>,
        resource_type: impl Into<String>,
        rule: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            resource_type: resource_type.into(),
            rule: rule.into(),
            reason: reason.into(),
        }
    }

    fn for_resource(resource: &ManagedResource, rule: &str, reason: impl Into<String>) -> Self {
        Self::new(&resource.id, &resource.resource_type, rule, reason)
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} ({}): {}", self.rule, self.resource_id, self.resource_type, self.reason)
    }
}

/// A check that can veto deletion based on the live state of the candidates.
///
/// A rule sees the whole candidate set, so it can reason across resources.
#[async_trait]
pub trait DeleteRule: Send + Sync {
    fn name(&self) -> &str;

    async fn check(
        &self,
        candidates: &[ResourceToDelete],
        manager: &dyn ResourceManager,
    ) -> Result<Vec<Violation>>;
}

/// The built-in rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteRuleKind {
    /// A postgres server still holds user databases
    PostgresServerHasDatabases,
    /// Something outside the candidate set still has an ip configuration in a subnet
    VirtualNetworkHasAttachedDevices,
    StorageAccountHasContainers,
    BatchAccountHasPools,
}

/// Databases every flexible server carries
const SYSTEM_DATABASES: &[&str] = &["azure_maintenance", "azure_sys", "postgres"];

impl DeleteRuleKind {
    pub const ALL: [DeleteRuleKind; 4] = [
        Self::PostgresServerHasDatabases,
        Self::VirtualNetworkHasAttachedDevices,
        Self::StorageAccountHasContainers,
        Self::BatchAccountHasPools,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PostgresServerHasDatabases => "postgres_server_has_databases",
            Self::VirtualNetworkHasAttachedDevices => "virtual_network_has_attached_devices",
            Self::StorageAccountHasContainers => "storage_account_has_containers",
            Self::BatchAccountHasPools => "batch_account_has_pools",
        }
    }

    fn applies_to(&self) -> &'static str {
        match self {
            Self::PostgresServerHasDatabases => resource_types::POSTGRES_FLEXIBLE_SERVER,
            Self::VirtualNetworkHasAttachedDevices => resource_types::VIRTUAL_NETWORK,
            Self::StorageAccountHasContainers => resource_types::STORAGE_ACCOUNT,
            Self::BatchAccountHasPools => resource_types::BATCH_ACCOUNT,
        }
    }

    fn evaluate(
        &self,
        live: &ManagedResource,
        candidates: &[ResourceToDelete],
    ) -> Option<Violation> {
        let rule = self.as_str();
        match self {
            Self::PostgresServerHasDatabases => {
                let databases: Vec<&str> = names_at(&live.properties, "databases")
                    .into_iter()
                    .filter(|name| !SYSTEM_DATABASES.contains(name))
                    .collect();
                (!databases.is_empty()).then(|| {
                    Violation::for_resource(
                        live,
                        rule,
                        format!("server has databases: {}", databases.join(", ")),
                    )
                })
            }
            Self::VirtualNetworkHasAttachedDevices => {
                let owned = owned_ids(candidates);
                let foreign: Vec<String> = attached_devices(&live.properties)
                    .into_iter()
                    .filter(|device| !is_owned(device, &owned))
                    .collect();
                (!foreign.is_empty()).then(|| {
                    Violation::for_resource(
                        live,
                        rule,
                        format!("subnets still used by: {}", foreign.join(", ")),
                    )
                })
            }
            Self::StorageAccountHasContainers => {
                let containers = names_at(&live.properties, "containers");
                (!containers.is_empty()).then(|| {
                    Violation::for_resource(
                        live,
                        rule,
                        format!("storage account has {} container(s)", containers.len()),
                    )
                })
            }
            Self::BatchAccountHasPools => {
                let pools = names_at(&live.properties, "pools");
                (!pools.is_empty()).then(|| {
                    Violation::for_resource(
                        live,
                        rule,
                        format!("batch account has pools: {}", pools.join(", ")),
                    )
                })
            }
        }
    }
}

#[async_trait]
impl DeleteRule for DeleteRuleKind {
    fn name(&self) -> &str {
        self.as_str()
    }

    async fn check(
        &self,
        candidates: &[ResourceToDelete],
        manager: &dyn ResourceManager,
    ) -> Result<Vec<Violation>> {
        let mut violations = Vec::new();
        for candidate in candidates {
            if !candidate.resource.is_type(self.applies_to()) {
                continue;
            }
            // The listing snapshot may omit properties; read the live resource
            let live = match manager.get_resource(&candidate.resource.id).await {
                Ok(live) => live,
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e.into()),
            };
            violations.extend(self.evaluate(&live, candidates));
        }
        Ok(violations)
    }
}

/// Strings in `properties[key]`, given either as names or as `{ "name": .. }` objects.
fn names_at<'a>(properties: &'a Value, key: &str) -> Vec<&'a str> {
    properties
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().or_else(|| item.get("name")?.as_str()))
                .collect()
        })
        .unwrap_or_default()
}

/// Owners of every subnet ip configuration, e.g. a network interface id.
fn attached_devices(properties: &Value) -> Vec<String> {
    let Some(subnets) = properties.get("subnets").and_then(Value::as_array) else {
        return Vec::new();
    };
    subnets
        .iter()
        .filter_map(|subnet| subnet.pointer("/properties/ipConfigurations")?.as_array())
        .flatten()
        .filter_map(|config| config.get("id")?.as_str())
        .map(|id| {
            let lower = id.to_ascii_lowercase();
            match lower.find("/ipconfigurations/") {
                Some(at) => id[..at].to_string(),
                None => id.to_string(),
            }
        })
        .collect()
}

/// Ids of everything being deleted, including endpoint network interfaces.
fn owned_ids(candidates: &[ResourceToDelete]) -> HashSet<String> {
    let mut owned = HashSet::new();
    for candidate in candidates {
        for resource in candidate.deletion_order() {
            owned.insert(resource.id.to_ascii_lowercase());
            let interfaces = resource
                .properties
                .get("networkInterfaces")
                .and_then(Value::as_array);
            for interface in interfaces.into_iter().flatten() {
                if let Some(id) = interface.get("id").and_then(Value::as_str) {
                    owned.insert(id.to_ascii_lowercase());
                }
            }
        }
    }
    owned
}

fn is_owned(device: &str, owned: &HashSet<String>) -> bool {
    let device = device.to_ascii_lowercase();
    owned
        .iter()
        .any(|id| device == *id || device.starts_with(&format!("{id}/")))
}

/// Runs every rule and collects all violations before deciding.
#[derive(Clone)]
pub struct DeleteRulesVerifier {
    rules: Vec<Arc<dyn DeleteRule>>,
}

impl Default for DeleteRulesVerifier {
    fn default() -> Self {
        Self {
            rules: DeleteRuleKind::ALL
                .into_iter()
                .map(|kind| Arc::new(kind) as Arc<dyn DeleteRule>)
                .collect(),
        }
    }
}

impl DeleteRulesVerifier {
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn with_rule(mut self, rule: Arc<dyn DeleteRule>) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Every violation from every rule; empty means deletion may proceed.
    pub async fn verify(
        &self,
        candidates: &[ResourceToDelete],
        manager: &dyn ResourceManager,
    ) -> Result<Vec<Violation>> {
        let mut violations = Vec::new();
        for rule in &self.rules {
            let found = rule.check(candidates, manager).await?;
            debug!(rule = rule.name(), violations = found.len(), "Delete rule checked");
            violations.extend(found);
        }
        Ok(violations)
    }
}
