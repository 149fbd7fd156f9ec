use landing_zone_core::resource_types;
use landing_zone_core::{ResourcePurpose, ResourceSpec, TagKey};
use serde_json::json;

use super::create::ResourceCreator;
use super::keys;
use super::names::ResourceNames;
use super::parameters::{ParametersResolver, COMPUTE_SUBNET, POSTGRESQL_SUBNET, VNET_ADDRESS_SPACE};
use crate::error::Result;
use crate::flight::{FlightContext, StepKind};

pub const POSTGRES_SUBNET_NAME: &str = "postgres-subnet";
pub const COMPUTE_SUBNET_NAME: &str = "compute-subnet";

/// The landing zone's virtual network with a postgres and a compute subnet.
///
/// Subnet names are tagged on the network by purpose so later steps and
/// other services can find them.
pub struct CreateVnet;

impl ResourceCreator for CreateVnet {
    fn kind(&self) -> StepKind {
        StepKind::CreateVnet
    }

    fn resource_key(&self) -> &'static str {
        keys::VNET
    }

    fn build_specs(&self, ctx: &FlightContext) -> Result<Vec<ResourceSpec>> {
        let request = keys::request(ctx)?;
        let names = ResourceNames::new(keys::landing_zone_id(ctx)?);
        let parameters = ParametersResolver::new(&request.parameters);

        let spec = ResourceSpec::new(
            resource_types::VIRTUAL_NETWORK,
            names.vnet(),
            &request.container.region,
        )
        .with_tag(ResourcePurpose::PostgresSubnet.as_str(), POSTGRES_SUBNET_NAME)
        .with_tag(ResourcePurpose::ComputeSubnet.as_str(), COMPUTE_SUBNET_NAME)
        .with_tag(TagKey::Purpose.as_str(), ResourcePurpose::SharedResource.as_str())
        .with_properties(json!({
            "addressSpace": { "addressPrefixes": [parameters.get(VNET_ADDRESS_SPACE)] },
            "subnets": [
                {
                    "name": POSTGRES_SUBNET_NAME,
                    "properties": { "addressPrefix": parameters.get(POSTGRESQL_SUBNET) }
                },
                {
                    "name": COMPUTE_SUBNET_NAME,
                    "properties": {
                        "addressPrefix": parameters.get(COMPUTE_SUBNET),
                        "privateEndpointNetworkPolicies": "Disabled"
                    }
                }
            ]
        }));
        Ok(vec![spec])
    }
}
