use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::resource::ManagedResource;

/// Parameter that switches a create request to attach mode
pub const ATTACH_PARAMETER: &str = "attach";

/// Where a landing zone's resources live: a tenant's subscription and
/// resource group in one region.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct ContainerRef {
    pub tenant_id: Uuid,
    pub subscription_id: Uuid,
    pub resource_group: String,
    pub region: String,
}

impl ContainerRef {
    pub fn scope(&self) -> String {
        format!(
            "/subscriptions/{}/resourceGroups/{}",
            self.subscription_id, self.resource_group
        )
    }

    pub fn resource_id(&self, resource_type: &str, name: &str) -> String {
        resource_path(&self.scope(), resource_type, name)
    }
}

/// Builds `{scope}/providers/{namespace}/{kind}/{name}`.
///
/// Nested types (`ns/zones/links`) take a matching `zone/link` name and
/// interleave the segments.
pub(crate) fn resource_path(scope: &str, resource_type: &str, name: &str) -> String {
    let mut segments = resource_type.split('/');
    let namespace = segments.next().unwrap_or_default();
    let kinds: Vec<&str> = segments.collect();
    let names: Vec<&str> = name.split('/').collect();

    let mut id = format!("{}/providers/{}", scope.trim_end_matches('/'), namespace);
    if kinds.len() == names.len() {
        for (kind, name) in kinds.iter().zip(names.iter()) {
            id.push('/');
            id.push_str(kind);
            id.push('/');
            id.push_str(name);
        }
    } else {
        id.push('/');
        id.push_str(&kinds.join("/"));
        id.push('/');
        id.push_str(name);
    }
    id
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LandingZoneRequest {
    /// Deployment profile, e.g. "base" or "protected_data"
    pub definition: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    pub container: ContainerRef,
    /// Caller-supplied identifier; generated when absent
    #[serde(default)]
    pub landing_zone_id: Option<Uuid>,
}

fn default_version() -> String {
    "v1".to_string()
}

impl LandingZoneRequest {
    pub fn new(definition: impl Into<String>, container: ContainerRef) -> Self {
        Self {
            definition: definition.into(),
            version: default_version(),
            parameters: BTreeMap::new(),
            container,
            landing_zone_id: None,
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn is_attaching(&self) -> bool {
        self.parameters
            .get(ATTACH_PARAMETER)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }
}

/// Persisted record of a landing zone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct LandingZone {
    pub id: Uuid,
    pub definition: String,
    pub version: String,
    pub container: ContainerRef,
    pub created_at: DateTime<Utc>,
}

impl LandingZone {
    pub fn new(id: Uuid, request: &LandingZoneRequest) -> Self {
        Self {
            id,
            definition: request.definition.clone(),
            version: request.version.clone(),
            container: request.container.clone(),
            created_at: Utc::now(),
        }
    }
}

/// Result of a successful provisioning run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct DeployedLandingZone {
    pub id: Uuid,
    pub resources: Vec<ManagedResource>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn container() -> ContainerRef {
        ContainerRef {
            tenant_id: Uuid::new_v4(),
            subscription_id: Uuid::nil(),
            resource_group: "mrg-1".to_string(),
            region: "eastus".to_string(),
        }
    }

    #[test]
    fn test_resource_id_for_top_level_type() {
        let id = container().resource_id("Microsoft.Network/virtualNetworks", "vnet-1");
        assert_eq!(
            id,
            "/subscriptions/00000000-0000-0000-0000-000000000000/resourceGroups/mrg-1/providers/Microsoft.Network/virtualNetworks/vnet-1"
        );
    }

    #[test]
    fn test_resource_id_for_nested_type() {
        let id = container().resource_id(
            "Microsoft.OperationalInsights/workspaces/dataExports",
            "law-1/export-1",
        );
        assert!(id.ends_with(
            "/providers/Microsoft.OperationalInsights/workspaces/law-1/dataExports/export-1"
        ));
    }

    #[test]
    fn test_attach_mode_parameter() {
        let request = LandingZoneRequest::new("base", container());
        assert!(!request.is_attaching());

        let request = request.with_parameter(ATTACH_PARAMETER, "TRUE");
        assert!(request.is_attaching());
    }

    #[test]
    fn test_request_defaults_on_deserialize() {
        let json = serde_json::json!({
            "definition": "base",
            "container": {
                "tenant_id": Uuid::nil(),
                "subscription_id": Uuid::nil(),
                "resource_group": "mrg",
                "region": "eastus"
            }
        });
        let request: LandingZoneRequest = serde_json::from_value(json).unwrap();

        assert_eq!(request.version, "v1");
        assert!(request.parameters.is_empty());
        assert!(request.landing_zone_id.is_none());
    }
}
