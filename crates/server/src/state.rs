use std::sync::{Arc, RwLock};

use anyhow::Context;
use events::EventBus;
use orchestrator::LandingZoneService;

use crate::config::ServiceConfig;
use crate::routes::sse::{EventBuffer, SharedEventBuffer, DEFAULT_EVENT_BUFFER_SIZE};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<LandingZoneService>,
    pub event_bus: EventBus,
    pub event_buffer: SharedEventBuffer,
}

impl AppState {
    /// `event_bus` must be the bus the service publishes to.
    pub fn new(service: LandingZoneService, event_bus: EventBus) -> Self {
        Self {
            service: Arc::new(service),
            event_bus,
            event_buffer: Arc::new(RwLock::new(EventBuffer::new(DEFAULT_EVENT_BUFFER_SIZE))),
        }
    }

    /// Opens the database, runs migrations and wires the service to the
    /// configured provider.
    pub async fn from_config(config: &ServiceConfig) -> anyhow::Result<Self> {
        let pool = db::create_pool(&config.database.url)
            .await
            .with_context(|| format!("Failed to open database {}", config.database.url))?;
        db::run_migrations(&pool)
            .await
            .context("Failed to run database migrations")?;

        let event_bus = EventBus::new();
        let service = LandingZoneService::new(
            config.provider.build(),
            pool,
            config.orchestrator.clone(),
            Some(event_bus.clone()),
        );
        Ok(Self::new(service, event_bus))
    }
}
