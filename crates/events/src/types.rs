//! Event payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata wrapper around every published event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub event: Event,
}

impl EventEnvelope {
    pub fn new(event: Event) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    // Flight lifecycle
    #[serde(rename = "flight.started")]
    FlightStarted { flight_id: Uuid, class: String },

    #[serde(rename = "flight.step_started")]
    StepStarted {
        flight_id: Uuid,
        step: String,
        index: usize,
    },

    /// A step asked to be retried; `attempt` counts from 1
    #[serde(rename = "flight.step_retrying")]
    StepRetrying {
        flight_id: Uuid,
        step: String,
        attempt: u32,
        error: String,
    },

    #[serde(rename = "flight.step_completed")]
    StepCompleted {
        flight_id: Uuid,
        step: String,
        index: usize,
    },

    /// Compensating action ran during rollback
    #[serde(rename = "flight.step_undone")]
    StepUndone {
        flight_id: Uuid,
        step: String,
        index: usize,
        success: bool,
    },

    #[serde(rename = "flight.completed")]
    FlightCompleted {
        flight_id: Uuid,
        status: String,
        error: Option<String>,
    },

    // Teardown
    #[serde(rename = "resource.deleted")]
    ResourceDeleted {
        landing_zone_id: Uuid,
        resource_id: String,
        resource_type: String,
    },

    #[serde(rename = "deletion.blocked")]
    DeletionBlocked {
        landing_zone_id: Uuid,
        violations: Vec<String>,
    },

    #[serde(rename = "landing_zone.deleted")]
    LandingZoneDeleted {
        landing_zone_id: Uuid,
        deleted: usize,
    },

    #[serde(rename = "error")]
    Error {
        message: String,
        context: Option<String>,
    },
}

impl Event {
    /// The serialized `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            Event::FlightStarted { .. } => "flight.started",
            Event::StepStarted { .. } => "flight.step_started",
            Event::StepRetrying { .. } => "flight.step_retrying",
            Event::StepCompleted { .. } => "flight.step_completed",
            Event::StepUndone { .. } => "flight.step_undone",
            Event::FlightCompleted { .. } => "flight.completed",
            Event::ResourceDeleted { .. } => "resource.deleted",
            Event::DeletionBlocked { .. } => "deletion.blocked",
            Event::LandingZoneDeleted { .. } => "landing_zone.deleted",
            Event::Error { .. } => "error",
        }
    }

    pub fn flight_id(&self) -> Option<Uuid> {
        match self {
            Event::FlightStarted { flight_id, .. }
            | Event::StepStarted { flight_id, .. }
            | Event::StepRetrying { flight_id, .. }
            | Event::StepCompleted { flight_id, .. }
            | Event::StepUndone { flight_id, .. }
            | Event::FlightCompleted { flight_id, .. } => Some(*flight_id),
            _ => None,
        }
    }

    pub fn landing_zone_id(&self) -> Option<Uuid> {
        match self {
            Event::ResourceDeleted {
                landing_zone_id, ..
            }
            | Event::DeletionBlocked {
                landing_zone_id, ..
            }
            | Event::LandingZoneDeleted {
                landing_zone_id, ..
            } => Some(*landing_zone_id),
            _ => None,
        }
    }
}
