use async_trait::async_trait;
use landing_zone_core::{DeployedLandingZone, ManagedResource};
use tracing::info;

use super::keys;
use crate::error::Result;
use crate::flight::{FlightContext, Step, StepKind, StepResult};

/// Collects every resource the flight's steps recorded into the flight's
/// `DeployedLandingZone` result.
pub struct AggregateResourcesStep {
    resource_keys: Vec<&'static str>,
}

impl AggregateResourcesStep {
    pub fn new(resource_keys: Vec<&'static str>) -> Self {
        Self { resource_keys }
    }

    fn aggregate(&self, ctx: &mut FlightContext) -> Result<()> {
        let landing_zone_id = keys::landing_zone_id(ctx)?;
        let mut resources: Vec<ManagedResource> = Vec::new();
        for key in &self.resource_keys {
            let created: Vec<ManagedResource> = ctx.working().get(key)?.unwrap_or_default();
            resources.extend(created);
        }

        info!(
            landing_zone_id = %landing_zone_id,
            resources = resources.len(),
            "Landing zone resources aggregated"
        );
        let deployed = DeployedLandingZone {
            id: landing_zone_id,
            resources,
        };
        ctx.working_mut().put(keys::RESPONSE, &deployed)?;
        Ok(())
    }
}

#[async_trait]
impl Step for AggregateResourcesStep {
    fn kind(&self) -> StepKind {
        StepKind::AggregateLandingZoneResources
    }

    async fn do_step(&self, ctx: &mut FlightContext) -> StepResult {
        self.aggregate(ctx).into()
    }

    async fn undo_step(&self, _ctx: &mut FlightContext) -> StepResult {
        // Nothing remote to undo
        StepResult::Success
    }
}
