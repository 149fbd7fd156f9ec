use std::sync::Arc;

use chrono::Utc;
use events::{Event, EventBus};
use landing_zone_core::{FlightClass, FlightStatus};
use tracing::{debug, error, info, warn};

use super::context::FlightContext;
use super::retry::RetryRule;
use super::step::{Step, StepKind, StepResult};
use super::store::FlightStore;
use crate::error::{OrchestratorError, Result};
use crate::state_machine::FlightStateMachine;

/// A step and the rule used to retry it.
#[derive(Clone)]
pub struct FlightStep {
    pub step: Arc<dyn Step>,
    pub retry: RetryRule,
}

impl FlightStep {
    pub fn new(step: impl Step + 'static, retry: RetryRule) -> Self {
        Self {
            step: Arc::new(step),
            retry,
        }
    }
}

/// Ordered steps of one flight class.
#[derive(Clone)]
pub struct FlightDefinition {
    class: FlightClass,
    steps: Vec<FlightStep>,
}

impl FlightDefinition {
    pub fn new(class: FlightClass) -> Self {
        Self {
            class,
            steps: Vec::new(),
        }
    }

    pub fn add_step(mut self, step: impl Step + 'static, retry: RetryRule) -> Self {
        self.steps.push(FlightStep::new(step, retry));
        self
    }

    pub fn extend(mut self, steps: impl IntoIterator<Item = FlightStep>) -> Self {
        self.steps.extend(steps);
        self
    }

    pub fn class(&self) -> FlightClass {
        self.class
    }

    pub fn steps(&self) -> &[FlightStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_kinds(&self) -> Vec<StepKind> {
        self.steps.iter().map(|s| s.step.kind()).collect()
    }

    /// Working-state keys of every step that records created resources
    pub fn resource_keys(&self) -> Vec<&'static str> {
        self.steps
            .iter()
            .flat_map(|s| s.step.resource_keys().iter().copied())
            .collect()
    }
}

/// Result of driving a step's action to completion under its retry rule
enum Attempt {
    Done,
    Failed(OrchestratorError),
}

/// Runs one flight: steps strictly in order, state saved after every attempt,
/// and on failure the compensating actions in strictly descending order.
pub struct FlightRunner {
    store: Arc<dyn FlightStore>,
    events: Option<EventBus>,
}

impl FlightRunner {
    pub fn new(store: Arc<dyn FlightStore>) -> Self {
        Self {
            store,
            events: None,
        }
    }

    pub fn with_events(mut self, events: Option<EventBus>) -> Self {
        self.events = events;
        self
    }

    /// Runs (or resumes from `next_step`) until the flight is terminal.
    ///
    /// Errors are store failures only; the flight is left non-terminal in
    /// the store and can be resumed. A flight saved as `RollingBack` resumes
    /// its undo, never the forward steps.
    pub async fn run(
        &self,
        definition: &FlightDefinition,
        ctx: &mut FlightContext,
    ) -> Result<FlightStatus> {
        let flight_id = ctx.flight_id();
        let status = ctx.record().status;
        if status.is_terminal() {
            return Ok(status);
        }
        if status == FlightStatus::RollingBack {
            info!(
                flight_id = %flight_id,
                class = definition.class().as_str(),
                pending = ctx.record().next_step,
                "Resuming rollback"
            );
            return self.complete_rollback(definition, ctx).await;
        }
        if status == FlightStatus::Queued {
            self.transition(ctx, FlightStatus::Running)?;
            self.persist(ctx).await?;
            self.emit(Event::FlightStarted {
                flight_id,
                class: definition.class().as_str().to_string(),
            });
        }

        let start = ctx.record().next_step;
        info!(
            flight_id = %flight_id,
            class = definition.class().as_str(),
            steps = definition.len(),
            start,
            "Running flight"
        );

        // (highest index whose undo must run, cause)
        let mut failure: Option<(Option<usize>, OrchestratorError)> = None;

        for (index, entry) in definition.steps().iter().enumerate().skip(start) {
            if ctx.is_cancelled() {
                failure = Some((index.checked_sub(1), OrchestratorError::Cancelled(flight_id)));
                break;
            }

            self.emit(Event::StepStarted {
                flight_id,
                step: entry.step.name().to_string(),
                index,
            });

            match self.do_with_retry(entry, ctx).await? {
                Attempt::Done => {
                    ctx.record_mut().next_step = index + 1;
                    self.persist(ctx).await?;
                    debug!(flight_id = %flight_id, step = entry.step.name(), index, "Step completed");
                    self.emit(Event::StepCompleted {
                        flight_id,
                        step: entry.step.name().to_string(),
                        index,
                    });
                }
                Attempt::Failed(e) => {
                    failure = Some((Some(index), e));
                    break;
                }
            }
        }

        let Some((undo_from, cause)) = failure else {
            return self.finish(ctx, FlightStatus::Success, None).await;
        };

        warn!(flight_id = %flight_id, error = %cause, "Flight failed, rolling back");
        let Some(undo_from) = undo_from else {
            return self
                .finish(ctx, FlightStatus::Error, Some(cause.to_string()))
                .await;
        };

        self.begin_rollback(ctx, undo_from, &cause).await?;
        self.complete_rollback(definition, ctx).await
    }

    /// Runs a step's action until it succeeds or its retry rule gives up.
    ///
    /// The final failed attempt is not saved here; `begin_rollback` saves it
    /// together with the rollback marker.
    async fn do_with_retry(&self, entry: &FlightStep, ctx: &mut FlightContext) -> Result<Attempt> {
        let flight_id = ctx.flight_id();
        let cancel = ctx.cancel_token().clone();
        let mut delays = entry.retry.delays();
        let mut attempt: u32 = 1;

        loop {
            let error = match entry.step.do_step(ctx).await {
                StepResult::Success => {
                    self.persist(ctx).await?;
                    return Ok(Attempt::Done);
                }
                StepResult::Fatal(e) => return Ok(Attempt::Failed(e)),
                StepResult::Retry(e) => e,
            };

            let Some(delay) = delays.next() else {
                warn!(
                    flight_id = %flight_id,
                    step = entry.step.name(),
                    attempts = attempt,
                    rule = entry.retry.name(),
                    "Retries exhausted"
                );
                return Ok(Attempt::Failed(error));
            };

            // Partial progress (e.g. some resources created) must survive
            self.persist(ctx).await?;
            warn!(
                flight_id = %flight_id,
                step = entry.step.name(),
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Step failed, retrying"
            );
            self.emit(Event::StepRetrying {
                flight_id,
                step: entry.step.name().to_string(),
                attempt,
                error: error.to_string(),
            });

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => {
                    return Ok(Attempt::Failed(OrchestratorError::Cancelled(flight_id)));
                }
            }
            attempt += 1;
        }
    }

    async fn undo_with_retry(&self, entry: &FlightStep, ctx: &mut FlightContext) -> Result<Attempt> {
        let mut delays = entry.retry.delays();

        loop {
            let result = entry.step.undo_step(ctx).await;
            self.persist(ctx).await?;

            let error = match result {
                StepResult::Success => return Ok(Attempt::Done),
                StepResult::Fatal(e) => return Ok(Attempt::Failed(e)),
                StepResult::Retry(e) => e,
            };

            let Some(delay) = delays.next() else {
                return Ok(Attempt::Failed(error));
            };
            warn!(
                flight_id = %ctx.flight_id(),
                step = entry.step.name(),
                error = %error,
                "Undo failed, retrying"
            );
            // Rollback is not interrupted by cancellation
            tokio::time::sleep(delay).await;
        }
    }

    /// Saves the rollback marker before any undo runs: steps `undo_from..=0`
    /// are pending and the cause is kept in `error`.
    async fn begin_rollback(
        &self,
        ctx: &mut FlightContext,
        undo_from: usize,
        cause: &OrchestratorError,
    ) -> Result<()> {
        self.transition(ctx, FlightStatus::RollingBack)?;
        let record = ctx.record_mut();
        record.next_step = undo_from + 1;
        record.error = Some(cause.to_string());
        self.persist(ctx).await
    }

    async fn complete_rollback(
        &self,
        definition: &FlightDefinition,
        ctx: &mut FlightContext,
    ) -> Result<FlightStatus> {
        let cause = ctx
            .record()
            .error
            .clone()
            .unwrap_or_else(|| "flight failed".to_string());

        match self.rollback(definition, ctx).await? {
            None => self.finish(ctx, FlightStatus::Error, Some(cause)).await,
            Some((step, undo_error)) => {
                error!(
                    flight_id = %ctx.flight_id(),
                    step = %step,
                    error = %undo_error,
                    "Rollback failed, resources may remain"
                );
                let message = format!("{cause}; rollback failed at {step}: {undo_error}");
                self.finish(ctx, FlightStatus::Fatal, Some(message)).await
            }
        }
    }

    /// Undoes the pending steps below `next_step` in descending order, saving
    /// progress after each; returns the first step whose undo failed.
    async fn rollback(
        &self,
        definition: &FlightDefinition,
        ctx: &mut FlightContext,
    ) -> Result<Option<(StepKind, OrchestratorError)>> {
        let flight_id = ctx.flight_id();
        let pending = ctx.record().next_step.min(definition.len());

        for index in (0..pending).rev() {
            let entry = &definition.steps()[index];
            let outcome = self.undo_with_retry(entry, ctx).await?;
            let success = matches!(outcome, Attempt::Done);
            self.emit(Event::StepUndone {
                flight_id,
                step: entry.step.name().to_string(),
                index,
                success,
            });
            if let Attempt::Failed(e) = outcome {
                return Ok(Some((entry.step.kind(), e)));
            }
            ctx.record_mut().next_step = index;
            self.persist(ctx).await?;
            debug!(flight_id = %flight_id, step = entry.step.name(), index, "Step undone");
        }
        Ok(None)
    }

    async fn finish(
        &self,
        ctx: &mut FlightContext,
        status: FlightStatus,
        error: Option<String>,
    ) -> Result<FlightStatus> {
        self.transition(ctx, status)?;
        ctx.record_mut().error = error.clone();
        self.persist(ctx).await?;

        info!(
            flight_id = %ctx.flight_id(),
            status = status.as_str(),
            "Flight finished"
        );
        self.emit(Event::FlightCompleted {
            flight_id: ctx.flight_id(),
            status: status.as_str().to_string(),
            error,
        });
        Ok(status)
    }

    fn transition(&self, ctx: &mut FlightContext, to: FlightStatus) -> Result<()> {
        FlightStateMachine::validate_transition(&ctx.record().status, &to)?;
        ctx.record_mut().status = to;
        Ok(())
    }

    async fn persist(&self, ctx: &mut FlightContext) -> Result<()> {
        ctx.record_mut().updated_at = Utc::now();
        self.store.save(ctx.record()).await
    }

    fn emit(&self, event: Event) {
        if let Some(bus) = &self.events {
            bus.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flight::store::InMemoryFlightStore;
    use async_trait::async_trait;
    use cloud::CloudError;
    use landing_zone_core::{FlightMap, FlightRecord};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    /// Test step that logs its calls and fails on demand
    struct ScriptedStep {
        kind: StepKind,
        log: Arc<Mutex<Vec<String>>>,
        failures_before_success: Mutex<u32>,
        fatal: bool,
        undo_fails: bool,
    }

    impl ScriptedStep {
        fn new(kind: StepKind, log: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                kind,
                log: log.clone(),
                failures_before_success: Mutex::new(0),
                fatal: false,
                undo_fails: false,
            }
        }

        fn transient_failures(self, n: u32) -> Self {
            *self.failures_before_success.lock().unwrap() = n;
            self
        }

        fn fatal(mut self) -> Self {
            self.fatal = true;
            self
        }

        fn undo_fails(mut self) -> Self {
            self.undo_fails = true;
            self
        }
    }

    #[async_trait]
    impl Step for ScriptedStep {
        fn kind(&self) -> StepKind {
            self.kind
        }

        async fn do_step(&self, ctx: &mut FlightContext) -> StepResult {
            self.log.lock().unwrap().push(format!("do:{}", self.kind));
            if self.fatal {
                return StepResult::Fatal(OrchestratorError::MissingRequiredInput(
                    "REQUIRED".to_string(),
                ));
            }
            {
                let mut remaining = self.failures_before_success.lock().unwrap();
                if *remaining > 0 {
                    *remaining -= 1;
                    return StepResult::Retry(CloudError::transient("throttled").into());
                }
            }
            ctx.working_mut().put(self.kind.as_str(), &true).unwrap();
            StepResult::Success
        }

        async fn undo_step(&self, ctx: &mut FlightContext) -> StepResult {
            self.log.lock().unwrap().push(format!("undo:{}", self.kind));
            if self.undo_fails {
                return StepResult::Retry(CloudError::transient("still busy").into());
            }
            ctx.working_mut().remove(self.kind.as_str());
            StepResult::Success
        }
    }

    /// Store whose nth save fails, as if the database went away mid-flight
    struct FailingStore {
        inner: InMemoryFlightStore,
        saves: AtomicUsize,
        fail_on: usize,
    }

    impl FailingStore {
        fn failing_on(fail_on: usize) -> Self {
            Self {
                inner: InMemoryFlightStore::new(),
                saves: AtomicUsize::new(0),
                fail_on,
            }
        }
    }

    #[async_trait]
    impl FlightStore for FailingStore {
        async fn save(&self, record: &FlightRecord) -> Result<()> {
            if self.saves.fetch_add(1, Ordering::SeqCst) + 1 == self.fail_on {
                return Err(OrchestratorError::Configuration("disk gone".to_string()));
            }
            self.inner.save(record).await
        }

        async fn load(&self, flight_id: Uuid) -> Result<Option<FlightRecord>> {
            self.inner.load(flight_id).await
        }

        async fn list_unfinished(&self) -> Result<Vec<FlightRecord>> {
            self.inner.list_unfinished().await
        }
    }

    fn context() -> FlightContext {
        let record = FlightRecord::new(
            Uuid::new_v4(),
            FlightClass::LandingZoneResources,
            FlightMap::new(),
        );
        FlightContext::new(record, CancellationToken::new())
    }

    fn fast() -> RetryRule {
        RetryRule::fixed(Duration::from_millis(1), 2)
    }

    #[tokio::test]
    async fn test_runs_all_steps_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let definition = FlightDefinition::new(FlightClass::LandingZoneResources)
            .add_step(ScriptedStep::new(StepKind::CreateVnet, &log), fast())
            .add_step(ScriptedStep::new(StepKind::CreatePostgresServer, &log), fast());
        let store = Arc::new(InMemoryFlightStore::new());
        let runner = FlightRunner::new(store.clone());
        let mut ctx = context();

        let status = runner.run(&definition, &mut ctx).await.unwrap();

        assert_eq!(status, FlightStatus::Success);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["do:create_vnet", "do:create_postgres_server"]
        );
        let stored = store.load(ctx.flight_id()).await.unwrap().unwrap();
        assert_eq!(stored.status, FlightStatus::Success);
        assert_eq!(stored.next_step, 2);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let definition = FlightDefinition::new(FlightClass::LandingZoneResources).add_step(
            ScriptedStep::new(StepKind::CreateVnet, &log).transient_failures(2),
            fast(),
        );
        let runner = FlightRunner::new(Arc::new(InMemoryFlightStore::new()));
        let mut ctx = context();

        let status = runner.run(&definition, &mut ctx).await.unwrap();

        assert_eq!(status, FlightStatus::Success);
        assert_eq!(log.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_failure_undoes_in_descending_order_including_failed_step() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let definition = FlightDefinition::new(FlightClass::LandingZoneResources)
            .add_step(ScriptedStep::new(StepKind::CreateVnet, &log), fast())
            .add_step(ScriptedStep::new(StepKind::CreatePostgresServer, &log), fast())
            .add_step(
                ScriptedStep::new(StepKind::CreatePostgresPrivateEndpoint, &log).fatal(),
                fast(),
            )
            .add_step(ScriptedStep::new(StepKind::CreatePostgresDnsZone, &log), fast());
        let runner = FlightRunner::new(Arc::new(InMemoryFlightStore::new()));
        let mut ctx = context();

        let status = runner.run(&definition, &mut ctx).await.unwrap();

        assert_eq!(status, FlightStatus::Error);
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "do:create_vnet",
                "do:create_postgres_server",
                "do:create_postgres_private_endpoint",
                "undo:create_postgres_private_endpoint",
                "undo:create_postgres_server",
                "undo:create_vnet",
            ]
        );
        assert!(ctx.working().is_empty());
        assert!(ctx
            .record()
            .error
            .as_deref()
            .unwrap()
            .contains("REQUIRED"));
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail_the_flight() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let definition = FlightDefinition::new(FlightClass::LandingZoneResources).add_step(
            ScriptedStep::new(StepKind::CreateVnet, &log).transient_failures(10),
            fast(),
        );
        let runner = FlightRunner::new(Arc::new(InMemoryFlightStore::new()));
        let mut ctx = context();

        let status = runner.run(&definition, &mut ctx).await.unwrap();

        assert_eq!(status, FlightStatus::Error);
        // One attempt plus two retries, then the undo
        assert_eq!(log.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_failed_undo_makes_flight_fatal() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let definition = FlightDefinition::new(FlightClass::LandingZoneResources)
            .add_step(
                ScriptedStep::new(StepKind::CreateVnet, &log).undo_fails(),
                fast(),
            )
            .add_step(
                ScriptedStep::new(StepKind::CreatePostgresServer, &log).fatal(),
                fast(),
            );
        let runner = FlightRunner::new(Arc::new(InMemoryFlightStore::new()));
        let mut ctx = context();

        let status = runner.run(&definition, &mut ctx).await.unwrap();

        assert_eq!(status, FlightStatus::Fatal);
        assert!(ctx
            .record()
            .error
            .as_deref()
            .unwrap()
            .contains("rollback failed at create_vnet"));
    }

    #[tokio::test]
    async fn test_resume_skips_completed_steps() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let definition = FlightDefinition::new(FlightClass::LandingZoneResources)
            .add_step(ScriptedStep::new(StepKind::CreateVnet, &log), fast())
            .add_step(ScriptedStep::new(StepKind::CreatePostgresServer, &log), fast());
        let runner = FlightRunner::new(Arc::new(InMemoryFlightStore::new()));
        let mut record = FlightRecord::new(
            Uuid::new_v4(),
            FlightClass::LandingZoneResources,
            FlightMap::new(),
        );
        record.status = FlightStatus::Running;
        record.next_step = 1;
        let mut ctx = FlightContext::new(record, CancellationToken::new());

        let status = runner.run(&definition, &mut ctx).await.unwrap();

        assert_eq!(status, FlightStatus::Success);
        assert_eq!(*log.lock().unwrap(), vec!["do:create_postgres_server"]);
    }

    #[tokio::test]
    async fn test_cancelled_flight_rolls_back_completed_steps() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let definition = FlightDefinition::new(FlightClass::LandingZoneResources)
            .add_step(ScriptedStep::new(StepKind::CreateVnet, &log), fast())
            .add_step(ScriptedStep::new(StepKind::CreatePostgresServer, &log), fast());
        let runner = FlightRunner::new(Arc::new(InMemoryFlightStore::new()));
        let mut record = FlightRecord::new(
            Uuid::new_v4(),
            FlightClass::LandingZoneResources,
            FlightMap::new(),
        );
        record.status = FlightStatus::Running;
        record.next_step = 1;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut ctx = FlightContext::new(record, cancel);

        let status = runner.run(&definition, &mut ctx).await.unwrap();

        assert_eq!(status, FlightStatus::Error);
        assert_eq!(*log.lock().unwrap(), vec!["undo:create_vnet"]);
    }

    #[tokio::test]
    async fn test_interrupted_rollback_resumes_undo_not_forward_steps() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let definition = FlightDefinition::new(FlightClass::LandingZoneResources)
            .add_step(ScriptedStep::new(StepKind::CreateVnet, &log), fast())
            .add_step(
                ScriptedStep::new(StepKind::CreatePostgresServer, &log).fatal(),
                fast(),
            );
        // Saves: start, vnet attempt, vnet done, rollback marker, then the
        // save after the postgres undo fails
        let store = Arc::new(FailingStore::failing_on(5));
        let runner = FlightRunner::new(store.clone());
        let mut ctx = context();

        let first = runner.run(&definition, &mut ctx).await;
        assert!(first.is_err());

        let persisted = store.load(ctx.flight_id()).await.unwrap().unwrap();
        assert_eq!(persisted.status, FlightStatus::RollingBack);
        assert_eq!(persisted.next_step, 2);
        assert_eq!(store.list_unfinished().await.unwrap().len(), 1);

        let mut resumed = FlightContext::new(persisted, CancellationToken::new());
        let status = runner.run(&definition, &mut resumed).await.unwrap();

        assert_eq!(status, FlightStatus::Error);
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "do:create_vnet",
                "do:create_postgres_server",
                "undo:create_postgres_server",
                "undo:create_postgres_server",
                "undo:create_vnet",
            ]
        );
        let stored = store.load(resumed.flight_id()).await.unwrap().unwrap();
        assert_eq!(stored.status, FlightStatus::Error);
        assert_eq!(stored.next_step, 0);
        assert!(stored.error.as_deref().unwrap().contains("REQUIRED"));
    }

    #[tokio::test]
    async fn test_rollback_marker_is_saved_before_first_undo() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let definition = FlightDefinition::new(FlightClass::LandingZoneResources)
            .add_step(ScriptedStep::new(StepKind::CreateVnet, &log), fast())
            .add_step(
                ScriptedStep::new(StepKind::CreatePostgresServer, &log).fatal(),
                fast(),
            );
        // The marker save itself fails: no undo has run yet
        let store = Arc::new(FailingStore::failing_on(4));
        let runner = FlightRunner::new(store.clone());
        let mut ctx = context();

        assert!(runner.run(&definition, &mut ctx).await.is_err());
        assert_eq!(
            *log.lock().unwrap(),
            vec!["do:create_vnet", "do:create_postgres_server"]
        );
    }

    #[tokio::test]
    async fn test_events_are_published() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let definition = FlightDefinition::new(FlightClass::LandingZoneResources)
            .add_step(ScriptedStep::new(StepKind::CreateVnet, &log), fast());
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let runner = FlightRunner::new(Arc::new(InMemoryFlightStore::new())).with_events(Some(bus));
        let mut ctx = context();

        runner.run(&definition, &mut ctx).await.unwrap();

        let mut kinds = Vec::new();
        while let Ok(envelope) = rx.try_recv() {
            kinds.push(envelope.event.kind());
        }
        assert_eq!(
            kinds,
            vec![
                "flight.started",
                "flight.step_started",
                "flight.step_completed",
                "flight.completed"
            ]
        );
    }
}
