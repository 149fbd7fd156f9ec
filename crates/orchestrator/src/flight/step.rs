use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::context::FlightContext;
use crate::error::{OrchestratorError, Result};

/// Every step the service knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    // Base profile
    CreateVnet,
    CreatePostgresServer,
    CreatePostgresPrivateEndpoint,
    CreatePostgresDnsZone,
    // Protected-data additions
    CreateLogAnalyticsWorkspace,
    ConnectLongTermLogStorage,
    CreateSentinel,
    CreateSentinelAlertRules,
    CreatePostgresLogSettings,
    // Closes every resources flight
    AggregateLandingZoneResources,
    // Parent flight
    LaunchResourcesFlight,
    AwaitResourcesFlight,
    CreateLandingZoneRecord,
}

impl StepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateVnet => "create_vnet",
            Self::CreatePostgresServer => "create_postgres_server",
            Self::CreatePostgresPrivateEndpoint => "create_postgres_private_endpoint",
            Self::CreatePostgresDnsZone => "create_postgres_dns_zone",
            Self::CreateLogAnalyticsWorkspace => "create_log_analytics_workspace",
            Self::ConnectLongTermLogStorage => "connect_long_term_log_storage",
            Self::CreateSentinel => "create_sentinel",
            Self::CreateSentinelAlertRules => "create_sentinel_alert_rules",
            Self::CreatePostgresLogSettings => "create_postgres_log_settings",
            Self::AggregateLandingZoneResources => "aggregate_landing_zone_resources",
            Self::LaunchResourcesFlight => "launch_resources_flight",
            Self::AwaitResourcesFlight => "await_resources_flight",
            Self::CreateLandingZoneRecord => "create_landing_zone_record",
        }
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one attempt at a step's action.
#[derive(Debug)]
pub enum StepResult {
    Success,
    /// Try again under the step's retry rule
    Retry(OrchestratorError),
    /// Stop and roll back
    Fatal(OrchestratorError),
}

impl StepResult {
    /// Classifies an error: transient failures retry, everything else is fatal.
    pub fn from_error(error: OrchestratorError) -> Self {
        if error.is_retryable() {
            Self::Retry(error)
        } else {
            Self::Fatal(error)
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl From<Result<()>> for StepResult {
    fn from(result: Result<()>) -> Self {
        match result {
            Ok(()) => Self::Success,
            Err(e) => Self::from_error(e),
        }
    }
}

/// A unit of provisioning work with a compensating action.
///
/// `do_step` runs at least once and may run again after a crash or a retry,
/// so it must converge: check for what already exists and adopt it. A step
/// reads the flight input and keys earlier steps wrote, and writes only its
/// own keys. `undo_step` removes only what those keys record, treats "not
/// found" as done, and is a no-op when its keys were never written.
#[async_trait]
pub trait Step: Send + Sync {
    fn kind(&self) -> StepKind;

    fn name(&self) -> &'static str {
        self.kind().as_str()
    }

    /// Working-state keys under which this step records created resources
    fn resource_keys(&self) -> &[&'static str] {
        &[]
    }

    async fn do_step(&self, ctx: &mut FlightContext) -> StepResult;

    async fn undo_step(&self, ctx: &mut FlightContext) -> StepResult;
}
