use landing_zone_core::resource_types;
use landing_zone_core::{ResourcePurpose, ResourceSpec, TagKey};
use serde_json::json;

use super::create::ResourceCreator;
use super::keys;
use super::names::ResourceNames;
use super::network::COMPUTE_SUBNET_NAME;
use super::parameters::{
    ParametersResolver, POSTGRES_SERVER_SKU, POSTGRES_STORAGE_SIZE_GB, POSTGRES_VERSION,
};
use crate::error::Result;
use crate::flight::{FlightContext, StepKind};

/// Flexible server reachable only through its private endpoint.
pub struct CreatePostgresServer;

impl ResourceCreator for CreatePostgresServer {
    fn kind(&self) -> StepKind {
        StepKind::CreatePostgresServer
    }

    fn resource_key(&self) -> &'static str {
        keys::POSTGRES
    }

    fn build_specs(&self, ctx: &FlightContext) -> Result<Vec<ResourceSpec>> {
        let request = keys::request(ctx)?;
        let names = ResourceNames::new(keys::landing_zone_id(ctx)?);
        let parameters = ParametersResolver::new(&request.parameters);
        let storage_size_gb: u32 = parameters.parse(POSTGRES_STORAGE_SIZE_GB)?;

        let spec = ResourceSpec::new(
            resource_types::POSTGRES_FLEXIBLE_SERVER,
            names.postgres_server(),
            &request.container.region,
        )
        .with_tag(TagKey::Purpose.as_str(), ResourcePurpose::SharedResource.as_str())
        .with_properties(json!({
            "sku": { "name": parameters.get(POSTGRES_SERVER_SKU), "tier": "GeneralPurpose" },
            "version": parameters.get(POSTGRES_VERSION),
            "storage": { "storageSizeGB": storage_size_gb },
            "network": { "publicNetworkAccess": "Disabled" },
            "authConfig": { "activeDirectoryAuth": "Enabled", "passwordAuth": "Disabled" }
        }));
        Ok(vec![spec])
    }
}

/// Private endpoint in the compute subnet connecting to the server.
pub struct CreatePostgresPrivateEndpoint;

impl ResourceCreator for CreatePostgresPrivateEndpoint {
    fn kind(&self) -> StepKind {
        StepKind::CreatePostgresPrivateEndpoint
    }

    fn resource_key(&self) -> &'static str {
        keys::POSTGRES_PRIVATE_ENDPOINT
    }

    fn build_specs(&self, ctx: &FlightContext) -> Result<Vec<ResourceSpec>> {
        let request = keys::request(ctx)?;
        let names = ResourceNames::new(keys::landing_zone_id(ctx)?);
        let vnet = keys::created_of_type(ctx, keys::VNET, resource_types::VIRTUAL_NETWORK)?;
        let server = keys::created_of_type(
            ctx,
            keys::POSTGRES,
            resource_types::POSTGRES_FLEXIBLE_SERVER,
        )?;

        let spec = ResourceSpec::new(
            resource_types::PRIVATE_ENDPOINT,
            names.postgres_private_endpoint(),
            &request.container.region,
        )
        .with_properties(json!({
            "subnet": { "id": format!("{}/subnets/{}", vnet.id, COMPUTE_SUBNET_NAME) },
            "privateLinkServiceConnections": [
                {
                    "name": names.postgres_private_endpoint(),
                    "properties": {
                        "privateLinkServiceId": server.id,
                        "groupIds": ["postgresqlServer"]
                    }
                }
            ]
        }));
        Ok(vec![spec])
    }
}

/// Private DNS zone for the server's endpoint, linked to the network.
pub struct CreatePostgresDnsZone;

impl ResourceCreator for CreatePostgresDnsZone {
    fn kind(&self) -> StepKind {
        StepKind::CreatePostgresDnsZone
    }

    fn resource_key(&self) -> &'static str {
        keys::POSTGRES_DNS
    }

    fn build_specs(&self, ctx: &FlightContext) -> Result<Vec<ResourceSpec>> {
        let names = ResourceNames::new(keys::landing_zone_id(ctx)?);
        let vnet = keys::created_of_type(ctx, keys::VNET, resource_types::VIRTUAL_NETWORK)?;

        // DNS zones and their links are global resources
        let zone = ResourceSpec::new(resource_types::PRIVATE_DNS_ZONE, names.dns_zone(), "global");
        let link = ResourceSpec::new(
            resource_types::VIRTUAL_NETWORK_LINK,
            names.dns_zone_link(),
            "global",
        )
        .with_properties(json!({
            "virtualNetwork": { "id": vnet.id },
            "registrationEnabled": false
        }));
        Ok(vec![zone, link])
    }
}
