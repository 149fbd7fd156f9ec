//! Which steps make up each flight, per deployment profile.

use std::sync::Arc;

use cloud::ResourceManager;
use db::LandingZoneRepository;
use landing_zone_core::{FlightClass, FlightMap, LandingZoneRequest};
use serde::Serialize;

use crate::config::{OrchestratorConfig, ProtectedDataConfig};
use crate::error::{OrchestratorError, Result};
use crate::flight::{
    AwaitSubFlightStep, FlightDefinition, FlightFactory, FlightStep, LaunchSubFlightStep,
    RetryRule, StepKind,
};
use crate::steps::{
    self, keys, AggregateResourcesStep, ConnectLongTermLogStorage, CreateLandingZoneRecordStep,
    CreateLogAnalyticsWorkspace, CreatePostgresDnsZone, CreatePostgresLogSettings,
    CreatePostgresPrivateEndpoint, CreatePostgresServer, CreateResourceStep, CreateSentinel,
    CreateSentinelAlertRules, CreateVnet, DeleteDeployedResources,
};

/// Deployment profiles. Each extends the one before it by appending steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum LandingZoneProfile {
    /// Network and a private postgres server
    Base,
    /// Base plus audit logging, long-term log export and Sentinel
    ProtectedData,
}

impl LandingZoneProfile {
    pub const ALL: [LandingZoneProfile; 2] = [Self::Base, Self::ProtectedData];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::ProtectedData => "protected_data",
        }
    }

    pub fn parse(name: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(name))
            .ok_or_else(|| OrchestratorError::UnknownDefinition(name.to_string()))
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Base => "Virtual network with a private PostgreSQL flexible server",
            Self::ProtectedData => {
                "Base landing zone with audit logs, long-term log storage and Sentinel monitoring"
            }
        }
    }
}

/// A profile as listed to callers.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct LandingZoneDefinition {
    pub name: LandingZoneProfile,
    pub description: String,
    pub version: String,
    /// Steps of the resources flight, in order
    pub steps: Vec<StepKind>,
}

/// Composes the resource steps of a profile. Builds step lists only; never
/// runs anything.
#[derive(Clone)]
pub struct StepsDefinitionProvider {
    manager: Arc<dyn ResourceManager>,
    protected_data: ProtectedDataConfig,
}

impl StepsDefinitionProvider {
    pub fn new(manager: Arc<dyn ResourceManager>, protected_data: ProtectedDataConfig) -> Self {
        Self {
            manager,
            protected_data,
        }
    }

    fn resource_step<C: steps::ResourceCreator + 'static>(&self, creator: C, retry: RetryRule) -> FlightStep {
        FlightStep::new(CreateResourceStep::new(creator, self.manager.clone()), retry)
    }

    fn base_steps(&self) -> Vec<FlightStep> {
        vec![
            self.resource_step(CreateVnet, RetryRule::cloud()),
            self.resource_step(CreatePostgresServer, RetryRule::cloud()),
            self.resource_step(CreatePostgresPrivateEndpoint, RetryRule::cloud()),
            self.resource_step(CreatePostgresDnsZone, RetryRule::cloud()),
        ]
    }

    fn protected_data_steps(&self) -> Vec<FlightStep> {
        vec![
            self.resource_step(CreateLogAnalyticsWorkspace, RetryRule::cloud()),
            self.resource_step(
                ConnectLongTermLogStorage::new(self.protected_data.clone()),
                RetryRule::cloud_long_running(),
            ),
            self.resource_step(CreateSentinel, RetryRule::cloud_long_running()),
            self.resource_step(
                CreateSentinelAlertRules::new(self.protected_data.clone()),
                RetryRule::cloud_long_running(),
            ),
            self.resource_step(CreatePostgresLogSettings, RetryRule::cloud()),
        ]
    }

    /// The profile's resource steps. Extended profiles append to the base
    /// list and never reorder it.
    pub fn steps(&self, profile: LandingZoneProfile) -> Vec<FlightStep> {
        let mut steps = self.base_steps();
        if profile == LandingZoneProfile::ProtectedData {
            steps.extend(self.protected_data_steps());
        }
        steps
    }

    /// The resources flight: the profile's steps, then aggregation.
    pub fn resources_flight(&self, profile: LandingZoneProfile) -> FlightDefinition {
        let definition =
            FlightDefinition::new(FlightClass::LandingZoneResources).extend(self.steps(profile));
        let resource_keys = definition.resource_keys();
        definition.add_step(
            AggregateResourcesStep::new(resource_keys),
            RetryRule::short_exponential(),
        )
    }

    pub fn definitions(&self) -> Vec<LandingZoneDefinition> {
        LandingZoneProfile::ALL
            .into_iter()
            .map(|profile| LandingZoneDefinition {
                name: profile,
                description: profile.description().to_string(),
                version: "v1".to_string(),
                steps: self.resources_flight(profile).step_kinds(),
            })
            .collect()
    }
}

/// Builds both landing-zone flights from their input.
pub struct LandingZoneFlightFactory {
    provider: StepsDefinitionProvider,
    teardown: Arc<DeleteDeployedResources>,
    landing_zones: LandingZoneRepository,
    config: OrchestratorConfig,
}

impl LandingZoneFlightFactory {
    pub fn new(
        manager: Arc<dyn ResourceManager>,
        landing_zones: LandingZoneRepository,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            teardown: Arc::new(DeleteDeployedResources::new(manager.clone())),
            provider: StepsDefinitionProvider::new(manager, config.protected_data.clone()),
            landing_zones,
            config,
        }
    }

    pub fn provider(&self) -> &StepsDefinitionProvider {
        &self.provider
    }

    /// Parent flight. In attach mode the resources already exist and only
    /// the record is written.
    pub fn create_landing_zone_flight(&self, request: &LandingZoneRequest) -> Result<FlightDefinition> {
        LandingZoneProfile::parse(&request.definition)?;
        let record = CreateLandingZoneRecordStep::new(self.landing_zones.clone());
        let definition = FlightDefinition::new(FlightClass::CreateLandingZone);

        if request.is_attaching() {
            return Ok(definition.add_step(record, RetryRule::short_exponential()));
        }

        Ok(definition
            .add_step(
                LaunchSubFlightStep::new(
                    StepKind::LaunchResourcesFlight,
                    FlightClass::LandingZoneResources,
                    keys::RESOURCES_FLIGHT_ID,
                )
                .with_compensation(self.teardown.clone())
                .with_polling(self.config.poll_interval(), self.config.poll_cycles),
                RetryRule::short_exponential(),
            )
            .add_step(
                AwaitSubFlightStep::new(
                    StepKind::AwaitResourcesFlight,
                    keys::RESOURCES_FLIGHT_ID,
                    keys::RESPONSE,
                )
                .with_polling(self.config.poll_interval(), self.config.poll_cycles),
                RetryRule::none(),
            )
            .add_step(record, RetryRule::short_exponential()))
    }
}

impl FlightFactory for LandingZoneFlightFactory {
    fn build(&self, class: FlightClass, input: &FlightMap) -> Result<FlightDefinition> {
        let request: LandingZoneRequest = input.require(keys::REQUEST)?;
        match class {
            FlightClass::CreateLandingZone => self.create_landing_zone_flight(&request),
            FlightClass::LandingZoneResources => {
                let profile = LandingZoneProfile::parse(&request.definition)?;
                Ok(self.provider.resources_flight(profile))
            }
        }
    }
}
