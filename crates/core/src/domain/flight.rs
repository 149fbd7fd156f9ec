use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::flight_map::FlightMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FlightClass {
    /// Parent flight: launches and awaits the resources flight, then records the landing zone
    CreateLandingZone,
    /// Child flight: creates the profile's cloud resources
    LandingZoneResources,
}

impl FlightClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateLandingZone => "create_landing_zone",
            Self::LandingZoneResources => "landing_zone_resources",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "create_landing_zone" => Some(Self::CreateLandingZone),
            "landing_zone_resources" => Some(Self::LandingZoneResources),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum FlightStatus {
    #[default]
    Queued,
    Running,
    /// A step failed and its compensating actions are underway
    RollingBack,
    Success,
    /// Failed and fully rolled back
    Error,
    /// Failed and the rollback did not complete
    Fatal,
}

impl FlightStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::RollingBack => "rolling_back",
            Self::Success => "success",
            Self::Error => "error",
            Self::Fatal => "fatal",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "running" => Some(Self::Running),
            "rolling_back" => Some(Self::RollingBack),
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            "fatal" => Some(Self::Fatal),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error | Self::Fatal)
    }
}

/// Durable state of one flight: where it is, what it was given, and what its
/// steps have written so far.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlightRecord {
    pub id: Uuid,
    pub class: FlightClass,
    pub status: FlightStatus,
    /// Index of the next step to run; equals the step count once all are done.
    /// While rolling back, the steps below this index still need their undo.
    pub next_step: usize,
    pub input: FlightMap,
    pub working: FlightMap,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FlightRecord {
    pub fn new(id: Uuid, class: FlightClass, input: FlightMap) -> Self {
        let now = Utc::now();
        Self {
            id,
            class,
            status: FlightStatus::default(),
            next_step: 0,
            input,
            working: FlightMap::new(),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The working map of a successful flight is its result.
    pub fn result(&self) -> Option<&FlightMap> {
        (self.status == FlightStatus::Success).then_some(&self.working)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flight_status_parsing() {
        for status in [
            FlightStatus::Queued,
            FlightStatus::Running,
            FlightStatus::RollingBack,
            FlightStatus::Success,
            FlightStatus::Error,
            FlightStatus::Fatal,
        ] {
            assert_eq!(FlightStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(FlightStatus::parse("invalid"), None);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!FlightStatus::Queued.is_terminal());
        assert!(!FlightStatus::Running.is_terminal());
        assert!(!FlightStatus::RollingBack.is_terminal());
        assert!(FlightStatus::Error.is_terminal());
    }

    #[test]
    fn test_result_only_on_success() {
        let mut record = FlightRecord::new(
            Uuid::new_v4(),
            FlightClass::LandingZoneResources,
            FlightMap::new(),
        );
        assert!(record.result().is_none());

        record.status = FlightStatus::Success;
        assert!(record.result().is_some());
    }

    #[test]
    fn test_flight_class_parsing() {
        assert_eq!(
            FlightClass::parse("create_landing_zone"),
            Some(FlightClass::CreateLandingZone)
        );
        assert_eq!(FlightClass::parse("nope"), None);
    }
}
