use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use events::EventBus;
use landing_zone_core::{FlightClass, FlightMap, FlightRecord, FlightStatus};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::context::FlightContext;
use super::runner::{FlightDefinition, FlightRunner};
use super::store::FlightStore;
use crate::error::{OrchestratorError, Result};

/// The three operations a step needs to run a nested flight.
#[async_trait]
pub trait SubOperationEngine: Send + Sync {
    /// Starts a flight under a caller-chosen id. Launching an id that already
    /// exists adopts it instead of starting a second run.
    async fn launch(&self, flight_id: Uuid, class: FlightClass, input: FlightMap) -> Result<Uuid>;

    async fn get_status(&self, flight_id: Uuid) -> Result<FlightRecord>;

    /// Requests cancellation; the flight rolls back what it already did.
    async fn cancel(&self, flight_id: Uuid) -> Result<()>;
}

/// Rebuilds a flight's steps from its class and input, on launch and on recovery.
pub trait FlightFactory: Send + Sync {
    fn build(&self, class: FlightClass, input: &FlightMap) -> Result<FlightDefinition>;
}

struct Inner {
    factory: Arc<dyn FlightFactory>,
    store: Arc<dyn FlightStore>,
    events: Option<EventBus>,
    running: Mutex<HashMap<Uuid, CancellationToken>>,
}

/// In-process engine: every flight runs as a tokio task, state goes through
/// the [`FlightStore`].
#[derive(Clone)]
pub struct LocalFlightEngine {
    inner: Arc<Inner>,
}

impl LocalFlightEngine {
    pub fn new(
        factory: Arc<dyn FlightFactory>,
        store: Arc<dyn FlightStore>,
        events: Option<EventBus>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                factory,
                store,
                events,
                running: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Starts a top-level flight under a fresh id.
    pub async fn submit(&self, class: FlightClass, input: FlightMap) -> Result<Uuid> {
        self.launch(Uuid::new_v4(), class, input).await
    }

    /// Resumes every unfinished flight found in the store. Returns how many
    /// were restarted.
    pub async fn recover(&self) -> Result<usize> {
        let unfinished = self.inner.store.list_unfinished().await?;
        let mut resumed = 0;

        for mut record in unfinished {
            if self.inner.running.lock().await.contains_key(&record.id) {
                continue;
            }
            match self.inner.factory.build(record.class, &record.input) {
                Ok(definition) => {
                    info!(
                        flight_id = %record.id,
                        class = record.class.as_str(),
                        next_step = record.next_step,
                        "Resuming flight"
                    );
                    self.spawn(definition, record).await;
                    resumed += 1;
                }
                Err(e) => {
                    warn!(flight_id = %record.id, error = %e, "Cannot rebuild flight, marking failed");
                    record.status = FlightStatus::Error;
                    record.error = Some(e.to_string());
                    record.updated_at = chrono::Utc::now();
                    self.inner.store.save(&record).await?;
                }
            }
        }
        Ok(resumed)
    }

    pub async fn is_running(&self, flight_id: Uuid) -> bool {
        self.inner.running.lock().await.contains_key(&flight_id)
    }

    /// Polls the store until the flight is terminal.
    pub async fn wait_for_terminal(&self, flight_id: Uuid, interval: Duration) -> Result<FlightRecord> {
        loop {
            let record = self.get_status(flight_id).await?;
            if record.status.is_terminal() {
                return Ok(record);
            }
            tokio::time::sleep(interval).await;
        }
    }

    async fn spawn(&self, definition: FlightDefinition, record: FlightRecord) {
        let flight_id = record.id;
        let cancel = CancellationToken::new();
        self.inner
            .running
            .lock()
            .await
            .insert(flight_id, cancel.clone());

        let engine = self.clone();
        tokio::spawn(async move {
            let nested: Arc<dyn SubOperationEngine> = Arc::new(engine.clone());
            let mut ctx = FlightContext::new(record, cancel)
                .with_engine(nested)
                .with_events(engine.inner.events.clone());
            let runner = FlightRunner::new(engine.inner.store.clone())
                .with_events(engine.inner.events.clone());

            match runner.run(&definition, &mut ctx).await {
                Ok(status) => {
                    info!(flight_id = %flight_id, status = status.as_str(), "Flight task finished");
                }
                Err(e) => {
                    // Left non-terminal in the store; recover() picks it up
                    error!(flight_id = %flight_id, error = %e, "Flight task aborted");
                }
            }
            engine.inner.running.lock().await.remove(&flight_id);
        });
    }
}

#[async_trait]
impl SubOperationEngine for LocalFlightEngine {
    async fn launch(&self, flight_id: Uuid, class: FlightClass, input: FlightMap) -> Result<Uuid> {
        if let Some(existing) = self.inner.store.load(flight_id).await? {
            info!(flight_id = %flight_id, status = existing.status.as_str(), "Adopting existing flight");
            return Ok(flight_id);
        }

        let definition = self.inner.factory.build(class, &input)?;
        let record = FlightRecord::new(flight_id, class, input);
        self.inner.store.save(&record).await?;

        info!(
            flight_id = %flight_id,
            class = class.as_str(),
            steps = definition.len(),
            "Launching flight"
        );
        self.spawn(definition, record).await;
        Ok(flight_id)
    }

    async fn get_status(&self, flight_id: Uuid) -> Result<FlightRecord> {
        self.inner
            .store
            .load(flight_id)
            .await?
            .ok_or(OrchestratorError::FlightNotFound(flight_id))
    }

    async fn cancel(&self, flight_id: Uuid) -> Result<()> {
        if let Some(token) = self.inner.running.lock().await.get(&flight_id) {
            info!(flight_id = %flight_id, "Cancelling flight");
            token.cancel();
            return Ok(());
        }
        // Not running here: only an unknown id is an error
        self.get_status(flight_id).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flight::step::{Step, StepKind, StepResult};
    use crate::flight::store::InMemoryFlightStore;
    use crate::flight::RetryRule;

    struct Marker(StepKind);

    #[async_trait]
    impl Step for Marker {
        fn kind(&self) -> StepKind {
            self.0
        }

        async fn do_step(&self, ctx: &mut FlightContext) -> StepResult {
            let seen: u32 = ctx.working().get("RUNS").unwrap().unwrap_or(0);
            ctx.working_mut().put("RUNS", &(seen + 1)).unwrap();
            StepResult::Success
        }

        async fn undo_step(&self, _ctx: &mut FlightContext) -> StepResult {
            StepResult::Success
        }
    }

    struct Slow;

    #[async_trait]
    impl Step for Slow {
        fn kind(&self) -> StepKind {
            StepKind::CreatePostgresServer
        }

        async fn do_step(&self, ctx: &mut FlightContext) -> StepResult {
            ctx.cancel_token().cancelled().await;
            StepResult::Fatal(OrchestratorError::Cancelled(ctx.flight_id()))
        }

        async fn undo_step(&self, _ctx: &mut FlightContext) -> StepResult {
            StepResult::Success
        }
    }

    struct Factory {
        slow: bool,
    }

    impl FlightFactory for Factory {
        fn build(&self, class: FlightClass, _input: &FlightMap) -> Result<FlightDefinition> {
            let definition =
                FlightDefinition::new(class).add_step(Marker(StepKind::CreateVnet), RetryRule::none());
            Ok(if self.slow {
                definition.add_step(Slow, RetryRule::none())
            } else {
                definition
            })
        }
    }

    fn engine(slow: bool, store: Arc<InMemoryFlightStore>) -> LocalFlightEngine {
        LocalFlightEngine::new(Arc::new(Factory { slow }), store, None)
    }

    #[tokio::test]
    async fn test_launch_runs_to_success() {
        let engine = engine(false, Arc::new(InMemoryFlightStore::new()));
        let id = engine
            .submit(FlightClass::LandingZoneResources, FlightMap::new())
            .await
            .unwrap();

        let record = engine
            .wait_for_terminal(id, Duration::from_millis(5))
            .await
            .unwrap();
        assert_eq!(record.status, FlightStatus::Success);
        assert_eq!(record.result().unwrap().get::<u32>("RUNS").unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_launch_same_id_adopts() {
        let engine = engine(false, Arc::new(InMemoryFlightStore::new()));
        let id = Uuid::new_v4();
        engine
            .launch(id, FlightClass::LandingZoneResources, FlightMap::new())
            .await
            .unwrap();
        engine
            .wait_for_terminal(id, Duration::from_millis(5))
            .await
            .unwrap();

        let again = engine
            .launch(id, FlightClass::LandingZoneResources, FlightMap::new())
            .await
            .unwrap();
        assert_eq!(again, id);
        let record = engine.get_status(id).await.unwrap();
        assert_eq!(record.result().unwrap().get::<u32>("RUNS").unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_unknown_flight_is_not_found() {
        let engine = engine(false, Arc::new(InMemoryFlightStore::new()));
        let err = engine.get_status(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::FlightNotFound(_)));
    }

    #[tokio::test]
    async fn test_cancel_rolls_back() {
        let engine = engine(true, Arc::new(InMemoryFlightStore::new()));
        let id = engine
            .submit(FlightClass::LandingZoneResources, FlightMap::new())
            .await
            .unwrap();
        while engine.get_status(id).await.unwrap().next_step < 1 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }

        engine.cancel(id).await.unwrap();

        let record = engine
            .wait_for_terminal(id, Duration::from_millis(5))
            .await
            .unwrap();
        assert_eq!(record.status, FlightStatus::Error);
        assert!(record.error.unwrap().contains("cancelled"));
    }

    #[tokio::test]
    async fn test_recover_resumes_unfinished_flight() {
        let store = Arc::new(InMemoryFlightStore::new());
        let mut record = FlightRecord::new(
            Uuid::new_v4(),
            FlightClass::LandingZoneResources,
            FlightMap::new(),
        );
        record.status = FlightStatus::Running;
        store.save(&record).await.unwrap();

        let engine = engine(false, store);
        assert_eq!(engine.recover().await.unwrap(), 1);

        let done = engine
            .wait_for_terminal(record.id, Duration::from_millis(5))
            .await
            .unwrap();
        assert_eq!(done.status, FlightStatus::Success);
    }
}
