use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use landing_zone_core::{FlightClass, FlightMap, FlightRecord, FlightStatus};
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use super::context::FlightContext;
use super::engine::SubOperationEngine;
use super::step::{Step, StepKind, StepResult};
use crate::config::{DEFAULT_POLL_CYCLES, DEFAULT_POLL_INTERVAL_SECS};
use crate::error::{OrchestratorError, Result};

/// Stable id of the nested flight a parent launches, so a re-run of the
/// launching step after a crash finds the same flight.
pub fn derive_sub_flight_id(parent: Uuid, class: FlightClass) -> Uuid {
    let mut hasher = Sha256::new();
    hasher.update(parent.as_bytes());
    hasher.update(class.as_str().as_bytes());
    let digest = hasher.finalize();

    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    uuid::Builder::from_random_bytes(bytes).into_uuid()
}

/// Reverses the effects of a nested flight that succeeded before its parent
/// failed. Must treat already-removed effects as done.
#[async_trait]
pub trait SubFlightCompensation: Send + Sync {
    async fn compensate(&self, result: &FlightMap) -> StepResult;
}

/// Launches a nested flight with the parent's input and records its id.
///
/// Undo settles the nested flight first: a running one is cancelled and
/// awaited (it rolls itself back), a successful one is handed to the
/// compensation, if any.
pub struct LaunchSubFlightStep {
    kind: StepKind,
    class: FlightClass,
    flight_id_key: &'static str,
    compensation: Option<Arc<dyn SubFlightCompensation>>,
    interval: Duration,
    cycles: u32,
}

impl LaunchSubFlightStep {
    pub fn new(kind: StepKind, class: FlightClass, flight_id_key: &'static str) -> Self {
        Self {
            kind,
            class,
            flight_id_key,
            compensation: None,
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            cycles: DEFAULT_POLL_CYCLES,
        }
    }

    pub fn with_compensation(mut self, compensation: Arc<dyn SubFlightCompensation>) -> Self {
        self.compensation = Some(compensation);
        self
    }

    /// How long undo waits for a cancelled sub-flight to finish rolling back
    pub fn with_polling(mut self, interval: Duration, cycles: u32) -> Self {
        self.interval = interval;
        self.cycles = cycles;
        self
    }

    /// Cancels the sub-flight if it is still going and waits for it to become
    /// terminal. `None` when it was never launched.
    async fn settle(
        &self,
        engine: &dyn SubOperationEngine,
        sub_flight_id: Uuid,
    ) -> Result<Option<FlightRecord>> {
        let mut cancelled = false;
        for _ in 0..=self.cycles {
            let record = match engine.get_status(sub_flight_id).await {
                Ok(record) => record,
                Err(OrchestratorError::FlightNotFound(_)) => return Ok(None),
                Err(e) => return Err(e),
            };
            if record.status.is_terminal() {
                return Ok(Some(record));
            }
            if !cancelled {
                info!(
                    sub_flight_id = %sub_flight_id,
                    status = record.status.as_str(),
                    "Cancelling sub-flight"
                );
                engine.cancel(sub_flight_id).await?;
                cancelled = true;
            }
            tokio::time::sleep(self.interval).await;
        }
        Err(OrchestratorError::SubOperationTimeout {
            flight_id: sub_flight_id,
            cycles: self.cycles,
        })
    }
}

#[async_trait]
impl Step for LaunchSubFlightStep {
    fn kind(&self) -> StepKind {
        self.kind
    }

    async fn do_step(&self, ctx: &mut FlightContext) -> StepResult {
        let existing = match ctx.working().get::<Uuid>(self.flight_id_key) {
            Ok(id) => id,
            Err(e) => return StepResult::Fatal(e.into()),
        };
        let sub_flight_id = match existing {
            Some(id) => id,
            None => {
                // Recorded before launching: a retry must reuse it
                let id = derive_sub_flight_id(ctx.flight_id(), self.class);
                if let Err(e) = ctx.working_mut().put(self.flight_id_key, &id) {
                    return StepResult::Fatal(e.into());
                }
                id
            }
        };

        let engine = match ctx.engine() {
            Ok(engine) => engine,
            Err(e) => return StepResult::Fatal(e),
        };
        match engine
            .launch(sub_flight_id, self.class, ctx.input().clone())
            .await
        {
            Ok(_) => {
                info!(
                    flight_id = %ctx.flight_id(),
                    sub_flight_id = %sub_flight_id,
                    class = self.class.as_str(),
                    "Launched sub-flight"
                );
                StepResult::Success
            }
            // A sub-flight that cannot be built will never succeed
            Err(e @ OrchestratorError::MissingRequiredInput(_))
            | Err(e @ OrchestratorError::UnknownDefinition(_)) => StepResult::Fatal(e),
            Err(e) => StepResult::from_error(e),
        }
    }

    async fn undo_step(&self, ctx: &mut FlightContext) -> StepResult {
        let sub_flight_id = match ctx.working().get::<Uuid>(self.flight_id_key) {
            Ok(Some(id)) => id,
            Ok(None) => return StepResult::Success,
            Err(e) => return StepResult::Fatal(e.into()),
        };
        let engine = match ctx.engine() {
            Ok(engine) => engine,
            Err(e) => return StepResult::Fatal(e),
        };

        let record = match self.settle(engine.as_ref(), sub_flight_id).await {
            Ok(Some(record)) => record,
            Ok(None) => return StepResult::Success,
            Err(e) => {
                warn!(sub_flight_id = %sub_flight_id, error = %e, "Sub-flight did not settle");
                return StepResult::Retry(e);
            }
        };

        // Failed sub-flights have already rolled themselves back
        match (&self.compensation, record.status) {
            (Some(compensation), FlightStatus::Success) => {
                info!(
                    flight_id = %ctx.flight_id(),
                    sub_flight_id = %sub_flight_id,
                    "Compensating succeeded sub-flight"
                );
                compensation.compensate(&record.working).await
            }
            _ => StepResult::Success,
        }
    }
}
