use std::sync::Arc;

use async_trait::async_trait;
use cloud::ResourceManager;
use landing_zone_core::{DeployedLandingZone, FlightMap};
use tracing::{debug, info, warn};

use super::keys;
use crate::deletion::DeletionStrategies;
use crate::error::OrchestratorError;
use crate::flight::{StepResult, SubFlightCompensation};

/// Deletes the resources a finished resources flight reported, newest first.
///
/// Used when the parent flight fails after its resources flight succeeded;
/// the resources flight has nothing left to roll back by then.
pub struct DeleteDeployedResources {
    manager: Arc<dyn ResourceManager>,
    strategies: DeletionStrategies,
}

impl DeleteDeployedResources {
    pub fn new(manager: Arc<dyn ResourceManager>) -> Self {
        Self {
            manager,
            strategies: DeletionStrategies::default(),
        }
    }
}

#[async_trait]
impl SubFlightCompensation for DeleteDeployedResources {
    async fn compensate(&self, result: &FlightMap) -> StepResult {
        let deployed: DeployedLandingZone = match result.get(keys::RESPONSE) {
            Ok(Some(deployed)) => deployed,
            Ok(None) => return StepResult::Success,
            Err(e) => return StepResult::Fatal(e.into()),
        };

        for resource in deployed.resources.iter().rev() {
            match self.strategies.delete(self.manager.as_ref(), resource).await {
                Ok(()) => debug!(resource_id = %resource.id, "Compensation deleted resource"),
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    warn!(resource_id = %resource.id, error = %e, "Compensation delete failed");
                    return StepResult::Retry(OrchestratorError::from(e));
                }
            }
        }

        info!(
            landing_zone_id = %deployed.id,
            resources = deployed.resources.len(),
            "Deleted resources of failed landing zone"
        );
        StepResult::Success
    }
}
