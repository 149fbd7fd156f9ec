//! Entry point for callers: create, inspect and delete landing zones.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use cloud::{ResourceDirectory, ResourceManager};
use db::{DeletionLockRepository, FlightRepository, LandingZoneRepository};
use events::{Event, EventBus};
use landing_zone_core::{
    CoreError, DeployedLandingZone, FlightClass, FlightMap, FlightStatus, LandingZone,
    LandingZoneRequest, ManagedResource, TagKey,
};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::OrchestratorConfig;
use crate::definitions::{LandingZoneDefinition, LandingZoneFlightFactory, LandingZoneProfile};
use crate::deletion::{DeletionPlan, ResourcesDeleteManager};
use crate::error::{OrchestratorError, Result};
use crate::flight::{LocalFlightEngine, SubOperationEngine};
use crate::resources::DeletionLockGuard;
use crate::steps::keys;

/// Accepted create request.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateJob {
    pub job_id: Uuid,
    pub landing_zone_id: Uuid,
}

/// State of a create job as reported to callers.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct JobReport {
    pub job_id: Uuid,
    pub status: FlightStatus,
    pub error: Option<String>,
    /// Present once the job succeeded with resources
    pub result: Option<DeployedLandingZone>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct LandingZoneService {
    engine: LocalFlightEngine,
    factory: Arc<LandingZoneFlightFactory>,
    directory: ResourceDirectory,
    deleter: ResourcesDeleteManager,
    landing_zones: LandingZoneRepository,
    locks: DeletionLockRepository,
    events: Option<EventBus>,
    config: OrchestratorConfig,
}

impl LandingZoneService {
    /// Wires the service over a migrated pool and a cloud provider.
    pub fn new(
        manager: Arc<dyn ResourceManager>,
        pool: SqlitePool,
        config: OrchestratorConfig,
        events: Option<EventBus>,
    ) -> Self {
        let landing_zones = LandingZoneRepository::new(pool.clone());
        let factory = Arc::new(LandingZoneFlightFactory::new(
            manager.clone(),
            landing_zones.clone(),
            config.clone(),
        ));
        let engine = LocalFlightEngine::new(
            factory.clone(),
            Arc::new(FlightRepository::new(pool.clone())),
            events.clone(),
        );
        let directory = ResourceDirectory::new(manager);
        let deleter = ResourcesDeleteManager::new(directory.clone()).with_events(events.clone());

        Self {
            engine,
            factory,
            directory,
            deleter,
            landing_zones,
            locks: DeletionLockRepository::new(pool),
            events,
            config,
        }
    }

    pub fn with_deleter(mut self, deleter: ResourcesDeleteManager) -> Self {
        self.deleter = deleter.with_events(self.events.clone());
        self
    }

    pub fn engine(&self) -> &LocalFlightEngine {
        &self.engine
    }

    /// Validates the request and starts the create flight.
    ///
    /// Everything that can be rejected up front is rejected here, before a
    /// flight exists.
    pub async fn start_create(&self, mut request: LandingZoneRequest) -> Result<CreateJob> {
        let profile = LandingZoneProfile::parse(&request.definition)?;
        if request.container.resource_group.trim().is_empty() {
            return Err(CoreError::Validation("container resource group is required".into()).into());
        }
        if profile == LandingZoneProfile::ProtectedData
            && !request.is_attaching()
            && self
                .config
                .protected_data
                .storage_account_for(&request.container.region)
                .is_none()
        {
            return Err(OrchestratorError::Configuration(format!(
                "no long-term log storage account configured for region {}",
                request.container.region
            )));
        }

        let landing_zone_id = *request.landing_zone_id.get_or_insert_with(Uuid::new_v4);
        if self.landing_zones.find_by_id(landing_zone_id).await?.is_some() {
            return Err(CoreError::Validation(format!(
                "landing zone {landing_zone_id} already exists"
            ))
            .into());
        }

        let mut input = FlightMap::new();
        input.put(keys::LANDING_ZONE_ID, &landing_zone_id)?;
        input.put(keys::REQUEST, &request)?;
        let job_id = self
            .engine
            .submit(FlightClass::CreateLandingZone, input)
            .await?;

        info!(
            job_id = %job_id,
            landing_zone_id = %landing_zone_id,
            definition = profile.as_str(),
            attach = request.is_attaching(),
            "Landing zone creation started"
        );
        Ok(CreateJob {
            job_id,
            landing_zone_id,
        })
    }

    pub async fn job(&self, job_id: Uuid) -> Result<JobReport> {
        let record = self.engine.get_status(job_id).await?;
        let result = match record.result() {
            Some(working) => working.get::<DeployedLandingZone>(keys::RESPONSE)?,
            None => None,
        };
        Ok(JobReport {
            job_id,
            status: record.status,
            error: record.error,
            result,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    pub async fn get_landing_zone(&self, landing_zone_id: Uuid) -> Result<LandingZone> {
        self.landing_zones
            .find_by_id(landing_zone_id)
            .await?
            .ok_or(OrchestratorError::LandingZoneNotFound(landing_zone_id))
    }

    pub async fn list_landing_zones(&self) -> Result<Vec<LandingZone>> {
        Ok(self.landing_zones.find_all().await?)
    }

    /// Resources currently tagged with the landing zone's id.
    pub async fn list_resources(&self, landing_zone_id: Uuid) -> Result<Vec<ManagedResource>> {
        let zone = self.get_landing_zone(landing_zone_id).await?;
        Ok(self
            .directory
            .list_by_tag(
                &zone.container,
                TagKey::LandingZoneId.as_str(),
                &landing_zone_id.to_string(),
            )
            .await?)
    }

    /// What a deletion would remove, without removing anything.
    pub async fn plan_deletion(&self, landing_zone_id: Uuid) -> Result<DeletionPlan> {
        let zone = self.get_landing_zone(landing_zone_id).await?;
        self.deleter
            .plan_deletion(landing_zone_id, &zone.container)
            .await
    }

    /// Deletes every resource of the landing zone, then its record.
    ///
    /// Only one deletion per landing zone runs at a time.
    pub async fn delete_landing_zone(&self, landing_zone_id: Uuid) -> Result<Vec<ManagedResource>> {
        let zone = self.get_landing_zone(landing_zone_id).await?;
        let guard = DeletionLockGuard::acquire(self.locks.clone(), landing_zone_id).await?;

        let deleted = match self.delete_resources(&zone).await {
            Ok(deleted) => deleted,
            Err(e) => {
                if let Err(release_error) = guard.release().await {
                    warn!(landing_zone_id = %landing_zone_id, error = %release_error, "Failed to release deletion lock");
                }
                return Err(e);
            }
        };

        self.landing_zones.delete(landing_zone_id).await?;
        guard.release().await?;

        info!(
            landing_zone_id = %landing_zone_id,
            deleted = deleted.len(),
            "Landing zone deleted"
        );
        if let Some(bus) = &self.events {
            bus.emit(Event::LandingZoneDeleted {
                landing_zone_id,
                deleted: deleted.len(),
            });
        }
        Ok(deleted)
    }

    async fn delete_resources(&self, zone: &LandingZone) -> Result<Vec<ManagedResource>> {
        let plan = self.deleter.plan_deletion(zone.id, &zone.container).await?;
        self.deleter.execute(&plan).await
    }

    /// Resumes flights interrupted by a restart.
    pub async fn recover(&self) -> Result<usize> {
        let resumed = self.engine.recover().await?;
        if resumed > 0 {
            info!(resumed, "Recovered unfinished flights");
        }
        Ok(resumed)
    }

    pub fn definitions(&self) -> Vec<LandingZoneDefinition> {
        self.factory.provider().definitions()
    }
}
