use async_trait::async_trait;
use db::LandingZoneRepository;
use landing_zone_core::LandingZone;
use tracing::info;

use super::keys;
use crate::error::Result;
use crate::flight::{FlightContext, Step, StepKind, StepResult};

/// Persists the landing-zone record once its resources exist.
pub struct CreateLandingZoneRecordStep {
    repository: LandingZoneRepository,
}

impl CreateLandingZoneRecordStep {
    pub fn new(repository: LandingZoneRepository) -> Self {
        Self { repository }
    }

    async fn create(&self, ctx: &mut FlightContext) -> Result<()> {
        let landing_zone_id = keys::landing_zone_id(ctx)?;
        let request = keys::request(ctx)?;

        let inserted = self
            .repository
            .create(&LandingZone::new(landing_zone_id, &request))
            .await?;
        // An earlier attempt may have inserted it already
        let owned = inserted
            || ctx
                .working()
                .get::<bool>(keys::LANDING_ZONE_RECORD_CREATED)?
                .unwrap_or(false);
        ctx.working_mut()
            .put(keys::LANDING_ZONE_RECORD_CREATED, &owned)?;

        info!(
            landing_zone_id = %landing_zone_id,
            definition = %request.definition,
            inserted,
            "Landing zone record stored"
        );
        Ok(())
    }

    async fn delete(&self, ctx: &mut FlightContext) -> Result<()> {
        let owned = ctx
            .working()
            .get::<bool>(keys::LANDING_ZONE_RECORD_CREATED)?
            .unwrap_or(false);
        if owned {
            let landing_zone_id = keys::landing_zone_id(ctx)?;
            self.repository.delete(landing_zone_id).await?;
        }
        ctx.working_mut().remove(keys::LANDING_ZONE_RECORD_CREATED);
        Ok(())
    }
}

#[async_trait]
impl Step for CreateLandingZoneRecordStep {
    fn kind(&self) -> StepKind {
        StepKind::CreateLandingZoneRecord
    }

    async fn do_step(&self, ctx: &mut FlightContext) -> StepResult {
        self.create(ctx).await.into()
    }

    async fn undo_step(&self, ctx: &mut FlightContext) -> StepResult {
        match self.delete(ctx).await {
            Ok(()) => StepResult::Success,
            Err(e) => StepResult::Retry(e),
        }
    }
}
