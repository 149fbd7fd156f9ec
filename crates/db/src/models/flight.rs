use landing_zone_core::{FlightClass, FlightMap, FlightRecord, FlightStatus};
use uuid::Uuid;

use super::{datetime_to_timestamp, timestamp_to_datetime};
use crate::error::{DbError, Result};

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct FlightRow {
    pub id: String,
    pub class: String,
    pub status: String,
    pub next_step: i64,
    pub input: String,
    pub working: String,
    pub error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl FlightRow {
    pub fn into_domain(self) -> Result<FlightRecord> {
        let corrupt = |reason: String| DbError::CorruptRow {
            table: "flights",
            reason,
        };

        let id = Uuid::parse_str(&self.id).map_err(|e| corrupt(e.to_string()))?;
        let class = FlightClass::parse(&self.class)
            .ok_or_else(|| corrupt(format!("unknown class '{}'", self.class)))?;
        let status = FlightStatus::parse(&self.status)
            .ok_or_else(|| corrupt(format!("unknown status '{}'", self.status)))?;
        let input: FlightMap = serde_json::from_str(&self.input)?;
        let working: FlightMap = serde_json::from_str(&self.working)?;

        Ok(FlightRecord {
            id,
            class,
            status,
            next_step: usize::try_from(self.next_step).unwrap_or_default(),
            input,
            working,
            error: self.error,
            created_at: timestamp_to_datetime(self.created_at),
            updated_at: timestamp_to_datetime(self.updated_at),
        })
    }

    pub fn from_domain(record: &FlightRecord) -> Result<Self> {
        Ok(Self {
            id: record.id.to_string(),
            class: record.class.as_str().to_string(),
            status: record.status.as_str().to_string(),
            next_step: i64::try_from(record.next_step).unwrap_or(i64::MAX),
            input: serde_json::to_string(&record.input)?,
            working: serde_json::to_string(&record.working)?,
            error: record.error.clone(),
            created_at: datetime_to_timestamp(record.created_at),
            updated_at: datetime_to_timestamp(record.updated_at),
        })
    }
}
