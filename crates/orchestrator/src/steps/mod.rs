//! Steps of the landing-zone flights.
//!
//! Each resource step owns one working-state key (see [`keys`]) holding the
//! resources it created, which is all its undo ever deletes.

mod aggregate;
mod create;
pub mod keys;
mod monitoring;
mod names;
mod network;
mod parameters;
mod postgres;
mod record;
mod teardown;

pub use aggregate::AggregateResourcesStep;
pub use create::{CreateResourceStep, ResourceCreator};
pub use monitoring::{
    ConnectLongTermLogStorage, CreateLogAnalyticsWorkspace, CreatePostgresLogSettings,
    CreateSentinel, CreateSentinelAlertRules,
};
pub use names::ResourceNames;
pub use network::CreateVnet;
pub use parameters::ParametersResolver;
pub use postgres::{CreatePostgresDnsZone, CreatePostgresPrivateEndpoint, CreatePostgresServer};
pub use record::CreateLandingZoneRecordStep;
pub use teardown::DeleteDeployedResources;
