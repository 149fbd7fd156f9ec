use std::sync::Arc;

use async_trait::async_trait;
use cloud::{CloudError, ResourceManager};
use landing_zone_core::{ContainerRef, ManagedResource, ResourceSpec, TagKey};
use tracing::{debug, info, warn};

use super::keys;
use crate::deletion::DeletionStrategies;
use crate::error::{OrchestratorError, Result};
use crate::flight::{FlightContext, Step, StepKind, StepResult};

/// The part of a resource step that differs between steps: which resources
/// to ask for.
pub trait ResourceCreator: Send + Sync {
    fn kind(&self) -> StepKind;

    /// Working-state key under which created resources are recorded
    fn resource_key(&self) -> &'static str;

    /// Specs to create, in creation order. May read the flight input and
    /// keys of earlier steps.
    fn build_specs(&self, ctx: &FlightContext) -> Result<Vec<ResourceSpec>>;
}

/// Creates a creator's resources idempotently and deletes them on undo.
pub struct CreateResourceStep<C> {
    creator: C,
    manager: Arc<dyn ResourceManager>,
    strategies: DeletionStrategies,
    resource_keys: [&'static str; 1],
}

impl<C: ResourceCreator> CreateResourceStep<C> {
    pub fn new(creator: C, manager: Arc<dyn ResourceManager>) -> Self {
        let resource_keys = [creator.resource_key()];
        Self {
            creator,
            manager,
            strategies: DeletionStrategies::default(),
            resource_keys,
        }
    }

    /// Creates the resource, or adopts it when it already exists.
    async fn create_or_adopt(
        &self,
        container: &ContainerRef,
        spec: &ResourceSpec,
    ) -> std::result::Result<ManagedResource, CloudError> {
        match self.manager.create_resource(container, spec).await {
            Ok(resource) => Ok(resource),
            Err(e) if e.is_conflict() => {
                let resource_id = spec.resource_id(container);
                debug!(resource_id = %resource_id, "Resource already exists, adopting");
                self.manager.get_resource(&resource_id).await
            }
            Err(e) => Err(e),
        }
    }

    async fn create_all(&self, ctx: &mut FlightContext) -> Result<()> {
        let landing_zone_id = keys::landing_zone_id(ctx)?;
        let container = keys::request(ctx)?.container;
        let specs = self.creator.build_specs(ctx)?;
        let key = self.creator.resource_key();

        let mut created: Vec<ManagedResource> = ctx.working().get(key)?.unwrap_or_default();
        for spec in specs {
            let spec = spec.with_tag(TagKey::LandingZoneId.as_str(), landing_zone_id.to_string());
            let resource_id = spec.resource_id(&container);
            if created.iter().any(|r| r.id.eq_ignore_ascii_case(&resource_id)) {
                continue;
            }

            let resource = self.create_or_adopt(&container, &spec).await?;
            info!(
                landing_zone_id = %landing_zone_id,
                step = self.creator.kind().as_str(),
                resource_id = %resource.id,
                "Resource ready"
            );
            created.push(resource);
            // Recorded one by one so undo sees partial progress
            ctx.working_mut().put(key, &created)?;
        }
        if !ctx.working().contains(key) {
            ctx.working_mut().put(key, &created)?;
        }
        Ok(())
    }
}

#[async_trait]
impl<C: ResourceCreator> Step for CreateResourceStep<C> {
    fn kind(&self) -> StepKind {
        self.creator.kind()
    }

    fn resource_keys(&self) -> &[&'static str] {
        &self.resource_keys
    }

    async fn do_step(&self, ctx: &mut FlightContext) -> StepResult {
        self.create_all(ctx).await.into()
    }

    async fn undo_step(&self, ctx: &mut FlightContext) -> StepResult {
        let key = self.creator.resource_key();
        let mut remaining: Vec<ManagedResource> = match ctx.working().get(key) {
            Ok(Some(resources)) => resources,
            Ok(None) => return StepResult::Success,
            Err(e) => return StepResult::Fatal(e.into()),
        };

        while let Some(resource) = remaining.last() {
            match self.strategies.delete(self.manager.as_ref(), resource).await {
                Ok(()) => debug!(resource_id = %resource.id, "Undo deleted resource"),
                Err(e) if e.is_not_found() => {}
                Err(e) => {
                    warn!(resource_id = %resource.id, error = %e, "Undo delete failed");
                    return StepResult::Retry(OrchestratorError::from(e));
                }
            }
            remaining.pop();
            if let Err(e) = ctx.working_mut().put(key, &remaining) {
                return StepResult::Fatal(e.into());
            }
        }
        ctx.working_mut().remove(key);
        StepResult::Success
    }
}
