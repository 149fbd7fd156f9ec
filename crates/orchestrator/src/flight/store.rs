use std::collections::HashMap;

use async_trait::async_trait;
use landing_zone_core::FlightRecord;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;

/// Durable home of flight records.
///
/// The runner saves after every step attempt, so working state survives
/// retries and restarts.
#[async_trait]
pub trait FlightStore: Send + Sync {
    async fn save(&self, record: &FlightRecord) -> Result<()>;

    async fn load(&self, flight_id: Uuid) -> Result<Option<FlightRecord>>;

    /// Flights that have not reached a terminal status
    async fn list_unfinished(&self) -> Result<Vec<FlightRecord>>;
}

#[async_trait]
impl FlightStore for db::FlightRepository {
    async fn save(&self, record: &FlightRecord) -> Result<()> {
        Ok(db::FlightRepository::save(self, record).await?)
    }

    async fn load(&self, flight_id: Uuid) -> Result<Option<FlightRecord>> {
        Ok(self.find_by_id(flight_id).await?)
    }

    async fn list_unfinished(&self) -> Result<Vec<FlightRecord>> {
        Ok(self.find_unfinished().await?)
    }
}

/// Non-durable store for tests and the in-memory backend
#[derive(Default)]
pub struct InMemoryFlightStore {
    records: RwLock<HashMap<Uuid, FlightRecord>>,
}

impl InMemoryFlightStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FlightStore for InMemoryFlightStore {
    async fn save(&self, record: &FlightRecord) -> Result<()> {
        self.records.write().await.insert(record.id, record.clone());
        Ok(())
    }

    async fn load(&self, flight_id: Uuid) -> Result<Option<FlightRecord>> {
        Ok(self.records.read().await.get(&flight_id).cloned())
    }

    async fn list_unfinished(&self) -> Result<Vec<FlightRecord>> {
        let mut unfinished: Vec<_> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| !r.status.is_terminal())
            .cloned()
            .collect();
        unfinished.sort_by_key(|r| r.created_at);
        Ok(unfinished)
    }
}
