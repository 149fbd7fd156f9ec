use std::collections::HashSet;

use cloud::ResourceDirectory;
use events::{Event, EventBus};
use landing_zone_core::resource_types;
use landing_zone_core::{ContainerRef, ManagedResource, TagKey};
use tracing::{info, warn};
use uuid::Uuid;

use super::plan::{associate, DeletionPlan, FoundationalTypes, ResourceToDelete};
use super::rules::DeleteRulesVerifier;
use super::strategy::DeletionStrategies;
use crate::error::{OrchestratorError, Result};

/// Plans and executes the deletion of one landing zone's resources.
///
/// Deletion is forward-only: the first failed delete aborts the pass and
/// nothing already deleted is restored.
#[derive(Clone)]
pub struct ResourcesDeleteManager {
    directory: ResourceDirectory,
    verifier: DeleteRulesVerifier,
    foundational: FoundationalTypes,
    strategies: DeletionStrategies,
    events: Option<EventBus>,
}

impl ResourcesDeleteManager {
    pub fn new(directory: ResourceDirectory) -> Self {
        Self {
            directory,
            verifier: DeleteRulesVerifier::default(),
            foundational: FoundationalTypes::default(),
            strategies: DeletionStrategies::default(),
            events: None,
        }
    }

    pub fn with_verifier(mut self, verifier: DeleteRulesVerifier) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn with_foundational_types(mut self, foundational: FoundationalTypes) -> Self {
        self.foundational = foundational;
        self
    }

    pub fn with_strategies(mut self, strategies: DeletionStrategies) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn with_events(mut self, events: Option<EventBus>) -> Self {
        self.events = events;
        self
    }

    /// Discovers the landing zone's resources and orders them for deletion.
    pub async fn plan_deletion(
        &self,
        landing_zone_id: Uuid,
        container: &ContainerRef,
    ) -> Result<DeletionPlan> {
        let tagged = self
            .directory
            .list_by_tag(
                container,
                TagKey::LandingZoneId.as_str(),
                &landing_zone_id.to_string(),
            )
            .await?;
        let solutions = self
            .directory
            .list_by_type(container, resource_types::SOLUTION)
            .await?;
        let endpoints = self.directory.list_private_endpoints(container).await?;

        let (foundational, independent): (Vec<ResourceToDelete>, Vec<ResourceToDelete>) =
            associate(tagged, &endpoints, &solutions)
                .into_iter()
                .partition(|record| self.foundational.contains(&record.resource.resource_type));

        let plan = DeletionPlan {
            landing_zone_id,
            independent,
            foundational,
        };
        info!(
            landing_zone_id = %landing_zone_id,
            independent = plan.independent.len(),
            foundational = plan.foundational.len(),
            resources = plan.resource_count(),
            "Planned landing zone deletion"
        );
        Ok(plan)
    }

    /// Verifies the plan against every delete rule, then deletes it.
    ///
    /// Any violation blocks the whole plan before a single delete is issued.
    pub async fn execute(&self, plan: &DeletionPlan) -> Result<Vec<ManagedResource>> {
        let landing_zone_id = plan.landing_zone_id;
        let candidates: Vec<ResourceToDelete> = plan.records().cloned().collect();
        let violations = self
            .verifier
            .verify(&candidates, self.directory.manager().as_ref())
            .await?;

        if !violations.is_empty() {
            warn!(
                landing_zone_id = %landing_zone_id,
                violations = violations.len(),
                "Deletion blocked by delete rules"
            );
            self.emit(Event::DeletionBlocked {
                landing_zone_id,
                violations: violations.iter().map(ToString::to_string).collect(),
            });
            return Err(OrchestratorError::DeletionBlocked { violations });
        }

        let mut deleted = Vec::new();
        let mut seen = HashSet::new();
        for record in plan.independent.iter().chain(plan.foundational.iter()) {
            for resource in record.deletion_order() {
                if !seen.insert(resource.id.to_ascii_lowercase()) {
                    continue;
                }
                self.delete_one(landing_zone_id, resource).await?;
                deleted.push(resource.clone());
            }
        }

        info!(
            landing_zone_id = %landing_zone_id,
            deleted = deleted.len(),
            "Landing zone resources deleted"
        );
        Ok(deleted)
    }

    async fn delete_one(&self, landing_zone_id: Uuid, resource: &ManagedResource) -> Result<()> {
        let manager = self.directory.manager().as_ref();
        match self.strategies.delete(manager, resource).await {
            Ok(()) => {
                info!(
                    landing_zone_id = %landing_zone_id,
                    resource_id = %resource.id,
                    resource_type = %resource.resource_type,
                    "Deleted resource"
                );
            }
            // Removed with its parent, or by someone else
            Err(e) if e.is_not_found() => {
                info!(resource_id = %resource.id, "Resource already gone");
            }
            Err(e) => {
                warn!(
                    landing_zone_id = %landing_zone_id,
                    resource_id = %resource.id,
                    error = %e,
                    "Delete failed, aborting deletion pass"
                );
                return Err(e.into());
            }
        }
        self.emit(Event::ResourceDeleted {
            landing_zone_id,
            resource_id: resource.id.clone(),
            resource_type: resource.resource_type.clone(),
        });
        Ok(())
    }

    fn emit(&self, event: Event) {
        if let Some(bus) = &self.events {
            bus.emit(event);
        }
    }
}
