//! Flight input and working-state keys.

use landing_zone_core::{LandingZoneRequest, ManagedResource};
use uuid::Uuid;

use crate::error::{OrchestratorError, Result};
use crate::flight::FlightContext;

// Input
pub const LANDING_ZONE_ID: &str = "LANDING_ZONE_ID";
pub const REQUEST: &str = "LANDING_ZONE_REQUEST";

// Working state, one key per resource step
pub const VNET: &str = "VNET_RESOURCES";
pub const POSTGRES: &str = "POSTGRES_RESOURCES";
pub const POSTGRES_PRIVATE_ENDPOINT: &str = "POSTGRES_PRIVATE_ENDPOINT_RESOURCES";
pub const POSTGRES_DNS: &str = "POSTGRES_DNS_RESOURCES";
pub const LOG_ANALYTICS_WORKSPACE: &str = "LOG_ANALYTICS_WORKSPACE_RESOURCES";
pub const LONG_TERM_LOG_STORAGE: &str = "LONG_TERM_LOG_STORAGE_RESOURCES";
pub const SENTINEL: &str = "SENTINEL_RESOURCES";
pub const SENTINEL_ALERT_RULES: &str = "SENTINEL_ALERT_RULES_RESOURCES";
pub const POSTGRES_LOG_SETTINGS: &str = "POSTGRES_LOG_SETTINGS_RESOURCES";

/// Aggregated `DeployedLandingZone`
pub const RESPONSE: &str = "LANDING_ZONE_RESPONSE";
pub const RESOURCES_FLIGHT_ID: &str = "RESOURCES_FLIGHT_ID";
pub const LANDING_ZONE_RECORD_CREATED: &str = "LANDING_ZONE_RECORD_CREATED";

pub(crate) fn landing_zone_id(ctx: &FlightContext) -> Result<Uuid> {
    Ok(ctx.input().require(LANDING_ZONE_ID)?)
}

pub(crate) fn request(ctx: &FlightContext) -> Result<LandingZoneRequest> {
    Ok(ctx.input().require(REQUEST)?)
}

/// Resources an earlier step recorded under `key`.
pub(crate) fn created(ctx: &FlightContext, key: &str) -> Result<Vec<ManagedResource>> {
    Ok(ctx.working().require(key)?)
}

/// The one resource of `resource_type` an earlier step recorded under `key`.
pub(crate) fn created_of_type(
    ctx: &FlightContext,
    key: &str,
    resource_type: &str,
) -> Result<ManagedResource> {
    created(ctx, key)?
        .into_iter()
        .find(|r| r.is_type(resource_type))
        .ok_or_else(|| OrchestratorError::MissingRequiredInput(format!("{key}:{resource_type}")))
}
