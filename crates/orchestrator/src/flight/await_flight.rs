use std::time::Duration;

use async_trait::async_trait;
use landing_zone_core::FlightStatus;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::context::FlightContext;
use super::step::{Step, StepKind, StepResult};
use crate::config::{DEFAULT_POLL_CYCLES, DEFAULT_POLL_INTERVAL_SECS};
use crate::error::OrchestratorError;

const FALLBACK_FAILURE: &str = "Failed to create landing zone resources";

/// Waits for a nested flight and republishes its result.
///
/// Polls at a fixed interval for a bounded number of cycles; each cycle is
/// one status check followed by one sleep, so a flight that never finishes
/// fails after exactly `cycles * interval`. Every failure is fatal: the
/// nested flight has already spent its own retries.
pub struct AwaitSubFlightStep {
    kind: StepKind,
    flight_id_key: &'static str,
    result_key: &'static str,
    interval: Duration,
    cycles: u32,
}

impl AwaitSubFlightStep {
    pub fn new(kind: StepKind, flight_id_key: &'static str, result_key: &'static str) -> Self {
        Self {
            kind,
            flight_id_key,
            result_key,
            interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            cycles: DEFAULT_POLL_CYCLES,
        }
    }

    pub fn with_polling(mut self, interval: Duration, cycles: u32) -> Self {
        self.interval = interval;
        self.cycles = cycles;
        self
    }

    fn sub_flight_id(&self, ctx: &FlightContext) -> Result<Uuid, OrchestratorError> {
        Ok(ctx.working().require::<Uuid>(self.flight_id_key)?)
    }

    fn finish(
        &self,
        ctx: &mut FlightContext,
        sub_flight_id: Uuid,
        record: &landing_zone_core::FlightRecord,
    ) -> StepResult {
        let Some(result) = record.result() else {
            let reason = record
                .error
                .clone()
                .unwrap_or_else(|| FALLBACK_FAILURE.to_string());
            warn!(
                flight_id = %ctx.flight_id(),
                sub_flight_id = %sub_flight_id,
                status = record.status.as_str(),
                "Sub-flight did not succeed"
            );
            return StepResult::Fatal(OrchestratorError::sub_operation_failed(sub_flight_id, reason));
        };

        let value = match result.get::<serde_json::Value>(self.result_key) {
            Ok(Some(value)) => value,
            Ok(None) => {
                return StepResult::Fatal(OrchestratorError::SubOperationResultMissing {
                    flight_id: sub_flight_id,
                    key: self.result_key.to_string(),
                })
            }
            Err(e) => return StepResult::Fatal(e.into()),
        };
        if let Err(e) = ctx.working_mut().put(self.result_key, &value) {
            return StepResult::Fatal(e.into());
        }
        info!(
            flight_id = %ctx.flight_id(),
            sub_flight_id = %sub_flight_id,
            "Sub-flight succeeded"
        );
        StepResult::Success
    }
}

#[async_trait]
impl Step for AwaitSubFlightStep {
    fn kind(&self) -> StepKind {
        self.kind
    }

    async fn do_step(&self, ctx: &mut FlightContext) -> StepResult {
        let sub_flight_id = match self.sub_flight_id(ctx) {
            Ok(id) => id,
            Err(e) => return StepResult::Fatal(e),
        };
        let engine = match ctx.engine() {
            Ok(engine) => engine,
            Err(e) => return StepResult::Fatal(e),
        };
        let cancel = ctx.cancel_token().clone();

        for cycle in 1..=self.cycles {
            match engine.get_status(sub_flight_id).await {
                Ok(record) if record.status.is_terminal() => {
                    return self.finish(ctx, sub_flight_id, &record);
                }
                Ok(record) => {
                    debug!(
                        sub_flight_id = %sub_flight_id,
                        cycle,
                        status = record.status.as_str(),
                        "Sub-flight still running"
                    );
                }
                Err(e) if e.is_retryable() => {
                    warn!(sub_flight_id = %sub_flight_id, cycle, error = %e, "Status check failed");
                }
                Err(e) => return StepResult::Fatal(e),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = cancel.cancelled() => {
                    // The sub-flight keeps running; only our polling stops
                    return StepResult::Fatal(OrchestratorError::Cancelled(ctx.flight_id()));
                }
            }
        }

        warn!(
            flight_id = %ctx.flight_id(),
            sub_flight_id = %sub_flight_id,
            cycles = self.cycles,
            "Gave up waiting for sub-flight"
        );
        StepResult::Fatal(OrchestratorError::SubOperationTimeout {
            flight_id: sub_flight_id,
            cycles: self.cycles,
        })
    }

    async fn undo_step(&self, _ctx: &mut FlightContext) -> StepResult {
        StepResult::Success
    }
}
