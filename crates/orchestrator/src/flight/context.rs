use std::sync::Arc;

use events::{Event, EventBus};
use landing_zone_core::{FlightClass, FlightMap, FlightRecord};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::engine::SubOperationEngine;
use crate::error::{OrchestratorError, Result};

/// What a step sees while it runs: the flight's input and working state,
/// the engine for nested flights, and the flight's cancellation token.
pub struct FlightContext {
    record: FlightRecord,
    engine: Option<Arc<dyn SubOperationEngine>>,
    events: Option<EventBus>,
    cancel: CancellationToken,
}

impl FlightContext {
    pub fn new(record: FlightRecord, cancel: CancellationToken) -> Self {
        Self {
            record,
            engine: None,
            events: None,
            cancel,
        }
    }

    pub fn with_engine(mut self, engine: Arc<dyn SubOperationEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn with_events(mut self, events: Option<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn flight_id(&self) -> Uuid {
        self.record.id
    }

    pub fn class(&self) -> FlightClass {
        self.record.class
    }

    pub fn input(&self) -> &FlightMap {
        &self.record.input
    }

    pub fn working(&self) -> &FlightMap {
        &self.record.working
    }

    pub fn working_mut(&mut self) -> &mut FlightMap {
        &mut self.record.working
    }

    pub fn engine(&self) -> Result<Arc<dyn SubOperationEngine>> {
        self.engine.clone().ok_or_else(|| {
            OrchestratorError::Configuration(format!(
                "flight {} has no engine for nested flights",
                self.record.id
            ))
        })
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn emit(&self, event: Event) {
        if let Some(bus) = &self.events {
            bus.emit(event);
        }
    }

    pub fn record(&self) -> &FlightRecord {
        &self.record
    }

    pub(crate) fn record_mut(&mut self) -> &mut FlightRecord {
        &mut self.record
    }

    pub fn into_record(self) -> FlightRecord {
        self.record
    }
}
