pub mod config;
pub mod definitions;
pub mod deletion;
pub mod error;
pub mod flight;
pub mod resources;
pub mod service;
pub mod state_machine;
pub mod steps;

pub use config::{OrchestratorConfig, ProtectedDataConfig};
pub use definitions::{
    LandingZoneDefinition, LandingZoneFlightFactory, LandingZoneProfile, StepsDefinitionProvider,
};
pub use deletion::{
    DeleteRule, DeleteRuleKind, DeleteRulesVerifier, DeletionPlan, ResourceToDelete,
    ResourcesDeleteManager, Violation,
};
pub use error::{OrchestratorError, Result};
pub use flight::{FlightRunner, LocalFlightEngine, StepKind};
pub use service::{CreateJob, JobReport, LandingZoneService};
pub use state_machine::FlightStateMachine;
