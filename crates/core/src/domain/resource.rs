use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::landing_zone::{resource_path, ContainerRef};
use super::resource_types::type_matches;
use super::tags::TagKey;

/// Snapshot of a resource as reported by the provider.
///
/// Never mutated after it is read; callers decide its fate but do not edit it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ManagedResource {
    pub id: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    pub name: String,
    pub region: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub properties: serde_json::Value,
}

impl ManagedResource {
    pub fn tag(&self, key: TagKey) -> Option<&str> {
        self.tags.get(key.as_str()).map(String::as_str)
    }

    pub fn has_tag(&self, key: &str, value: &str) -> bool {
        self.tags.get(key).is_some_and(|v| v == value)
    }

    pub fn is_type(&self, resource_type: &str) -> bool {
        type_matches(&self.resource_type, resource_type)
    }
}

/// A private endpoint together with the resource ids it connects to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct PrivateEndpoint {
    pub resource: ManagedResource,
    pub connection_targets: Vec<String>,
}

impl PrivateEndpoint {
    /// Reads the connection targets out of both automatic and manual link
    /// service connections.
    pub fn from_resource(resource: ManagedResource) -> Self {
        let mut connection_targets = Vec::new();
        for section in [
            "privateLinkServiceConnections",
            "manualPrivateLinkServiceConnections",
        ] {
            let Some(connections) = resource.properties.get(section).and_then(|v| v.as_array())
            else {
                continue;
            };
            for connection in connections {
                let target = connection
                    .pointer("/properties/privateLinkServiceId")
                    .or_else(|| connection.get("privateLinkServiceId"))
                    .and_then(|v| v.as_str());
                if let Some(target) = target {
                    connection_targets.push(target.to_string());
                }
            }
        }
        Self {
            resource,
            connection_targets,
        }
    }

    pub fn targets(&self, resource_id: &str) -> bool {
        self.connection_targets
            .iter()
            .any(|target| target.eq_ignore_ascii_case(resource_id))
    }

    pub fn id(&self) -> &str {
        &self.resource.id
    }
}

/// What a provisioning step asks the provider to create.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceSpec {
    pub name: String,
    pub resource_type: String,
    pub region: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default)]
    pub properties: serde_json::Value,
    /// Set for extension resources that live under another resource's id
    #[serde(default)]
    pub parent_id: Option<String>,
}

impl ResourceSpec {
    pub fn new(
        resource_type: impl Into<String>,
        name: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            resource_type: resource_type.into(),
            region: region.into(),
            tags: BTreeMap::new(),
            properties: serde_json::Value::Object(Default::default()),
            parent_id: None,
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn with_properties(mut self, properties: serde_json::Value) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn resource_id(&self, container: &ContainerRef) -> String {
        match &self.parent_id {
            Some(parent) => resource_path(parent, &self.resource_type, &self.name),
            None => container.resource_id(&self.resource_type, &self.name),
        }
    }

    /// The resource the provider would report after creating this spec.
    pub fn into_resource(self, container: &ContainerRef) -> ManagedResource {
        let id = self.resource_id(container);
        let name = self
            .name
            .rsplit('/')
            .next()
            .unwrap_or(&self.name)
            .to_string();
        ManagedResource {
            id,
            resource_type: self.resource_type,
            name,
            region: self.region,
            tags: self.tags,
            properties: self.properties,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::resource_types;
    use serde_json::json;
    use uuid::Uuid;

    fn container() -> ContainerRef {
        ContainerRef {
            tenant_id: Uuid::nil(),
            subscription_id: Uuid::nil(),
            resource_group: "mrg".to_string(),
            region: "eastus".to_string(),
        }
    }

    #[test]
    fn test_private_endpoint_targets_ignore_case() {
        let resource = ManagedResource {
            id: "/subscriptions/x/pe".to_string(),
            resource_type: resource_types::PRIVATE_ENDPOINT.to_string(),
            name: "pe".to_string(),
            region: "eastus".to_string(),
            tags: BTreeMap::new(),
            properties: json!({
                "privateLinkServiceConnections": [
                    { "properties": { "privateLinkServiceId": "/Subscriptions/X/Servers/PG" } }
                ]
            }),
        };
        let endpoint = PrivateEndpoint::from_resource(resource);

        assert!(endpoint.targets("/subscriptions/x/servers/pg"));
        assert!(!endpoint.targets("/subscriptions/x/servers/other"));
    }

    #[test]
    fn test_extension_spec_id_is_scoped_to_parent() {
        let spec = ResourceSpec::new(resource_types::DIAGNOSTIC_SETTING, "pg-logs", "eastus")
            .with_parent("/subscriptions/1/resourceGroups/mrg/providers/Microsoft.DBforPostgreSQL/flexibleServers/pg");

        assert_eq!(
            spec.resource_id(&container()),
            "/subscriptions/1/resourceGroups/mrg/providers/Microsoft.DBforPostgreSQL/flexibleServers/pg/providers/Microsoft.Insights/diagnosticSettings/pg-logs"
        );
    }

    #[test]
    fn test_nested_spec_resource_keeps_leaf_name() {
        let spec = ResourceSpec::new(
            resource_types::VIRTUAL_NETWORK_LINK,
            "privatelink.postgres.database.azure.com/lz-link",
            "global",
        );
        let resource = spec.into_resource(&container());

        assert_eq!(resource.name, "lz-link");
        assert!(resource
            .id
            .ends_with("/privateDnsZones/privatelink.postgres.database.azure.com/virtualNetworkLinks/lz-link"));
    }
}
