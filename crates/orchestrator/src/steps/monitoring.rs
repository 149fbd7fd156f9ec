use landing_zone_core::resource_types;
use landing_zone_core::{ResourcePurpose, ResourceSpec, TagKey};
use serde_json::json;

use super::create::ResourceCreator;
use super::keys;
use super::names::ResourceNames;
use super::parameters::{ParametersResolver, AUDIT_LOG_RETENTION_DAYS};
use crate::config::ProtectedDataConfig;
use crate::error::{OrchestratorError, Result};
use crate::flight::{FlightContext, StepKind};

pub struct CreateLogAnalyticsWorkspace;

impl ResourceCreator for CreateLogAnalyticsWorkspace {
    fn kind(&self) -> StepKind {
        StepKind::CreateLogAnalyticsWorkspace
    }

    fn resource_key(&self) -> &'static str {
        keys::LOG_ANALYTICS_WORKSPACE
    }

    fn build_specs(&self, ctx: &FlightContext) -> Result<Vec<ResourceSpec>> {
        let request = keys::request(ctx)?;
        let names = ResourceNames::new(keys::landing_zone_id(ctx)?);
        let retention_days: u32 =
            ParametersResolver::new(&request.parameters).parse(AUDIT_LOG_RETENTION_DAYS)?;

        let spec = ResourceSpec::new(
            resource_types::LOG_ANALYTICS_WORKSPACE,
            names.log_analytics_workspace(),
            &request.container.region,
        )
        .with_tag(TagKey::Purpose.as_str(), ResourcePurpose::ProtectedData.as_str())
        .with_properties(json!({
            "sku": { "name": "PerGB2018" },
            "retentionInDays": retention_days
        }));
        Ok(vec![spec])
    }
}

/// Exports the workspace's audit tables to the region's long-term storage
/// account. A region without a configured account cannot be served.
pub struct ConnectLongTermLogStorage {
    config: ProtectedDataConfig,
}

impl ConnectLongTermLogStorage {
    pub fn new(config: ProtectedDataConfig) -> Self {
        Self { config }
    }
}

impl ResourceCreator for ConnectLongTermLogStorage {
    fn kind(&self) -> StepKind {
        StepKind::ConnectLongTermLogStorage
    }

    fn resource_key(&self) -> &'static str {
        keys::LONG_TERM_LOG_STORAGE
    }

    fn build_specs(&self, ctx: &FlightContext) -> Result<Vec<ResourceSpec>> {
        let request = keys::request(ctx)?;
        let region = &request.container.region;
        let storage_account = self.config.storage_account_for(region).ok_or_else(|| {
            OrchestratorError::Configuration(format!(
                "no long-term log storage account configured for region {region}"
            ))
        })?;
        let names = ResourceNames::new(keys::landing_zone_id(ctx)?);
        // The workspace must exist before anything is exported from it
        keys::created_of_type(
            ctx,
            keys::LOG_ANALYTICS_WORKSPACE,
            resource_types::LOG_ANALYTICS_WORKSPACE,
        )?;

        let spec = ResourceSpec::new(
            resource_types::LOG_ANALYTICS_DATA_EXPORT,
            names.data_export(),
            region,
        )
        .with_properties(json!({
            "destination": { "resourceId": storage_account },
            "tableNames": self.config.log_tables,
            "enable": true
        }));
        Ok(vec![spec])
    }
}

/// Onboards the workspace to Sentinel.
///
/// The provider answers by creating an untagged `SecurityInsights(<workspace>)`
/// solution; deletion finds it by name.
pub struct CreateSentinel;

impl ResourceCreator for CreateSentinel {
    fn kind(&self) -> StepKind {
        StepKind::CreateSentinel
    }

    fn resource_key(&self) -> &'static str {
        keys::SENTINEL
    }

    fn build_specs(&self, ctx: &FlightContext) -> Result<Vec<ResourceSpec>> {
        let workspace = keys::created_of_type(
            ctx,
            keys::LOG_ANALYTICS_WORKSPACE,
            resource_types::LOG_ANALYTICS_WORKSPACE,
        )?;
        let spec = ResourceSpec::new(resource_types::SENTINEL_ONBOARDING, "default", &workspace.region)
            .with_parent(&workspace.id)
            .with_properties(json!({ "customerManagedKey": false }));
        Ok(vec![spec])
    }
}

/// Enables the configured scheduled alert rule templates.
pub struct CreateSentinelAlertRules {
    config: ProtectedDataConfig,
}

impl CreateSentinelAlertRules {
    pub fn new(config: ProtectedDataConfig) -> Self {
        Self { config }
    }
}

impl ResourceCreator for CreateSentinelAlertRules {
    fn kind(&self) -> StepKind {
        StepKind::CreateSentinelAlertRules
    }

    fn resource_key(&self) -> &'static str {
        keys::SENTINEL_ALERT_RULES
    }

    fn build_specs(&self, ctx: &FlightContext) -> Result<Vec<ResourceSpec>> {
        let workspace = keys::created_of_type(
            ctx,
            keys::LOG_ANALYTICS_WORKSPACE,
            resource_types::LOG_ANALYTICS_WORKSPACE,
        )?;
        // Rules only exist once Sentinel is on
        keys::created(ctx, keys::SENTINEL)?;

        Ok(self
            .config
            .alert_rules
            .iter()
            .map(|template| {
                ResourceSpec::new(resource_types::SENTINEL_ALERT_RULE, template, &workspace.region)
                    .with_parent(&workspace.id)
                    .with_properties(json!({
                        "kind": "Scheduled",
                        "alertRuleTemplateName": template,
                        "enabled": true
                    }))
            })
            .collect())
    }
}

/// Sends the server's logs to the workspace.
pub struct CreatePostgresLogSettings;

impl ResourceCreator for CreatePostgresLogSettings {
    fn kind(&self) -> StepKind {
        StepKind::CreatePostgresLogSettings
    }

    fn resource_key(&self) -> &'static str {
        keys::POSTGRES_LOG_SETTINGS
    }

    fn build_specs(&self, ctx: &FlightContext) -> Result<Vec<ResourceSpec>> {
        let names = ResourceNames::new(keys::landing_zone_id(ctx)?);
        let server = keys::created_of_type(
            ctx,
            keys::POSTGRES,
            resource_types::POSTGRES_FLEXIBLE_SERVER,
        )?;
        let workspace = keys::created_of_type(
            ctx,
            keys::LOG_ANALYTICS_WORKSPACE,
            resource_types::LOG_ANALYTICS_WORKSPACE,
        )?;

        let spec = ResourceSpec::new(
            resource_types::DIAGNOSTIC_SETTING,
            names.postgres_diagnostic_setting(),
            &server.region,
        )
        .with_parent(&server.id)
        .with_properties(json!({
            "workspaceId": workspace.id,
            "logs": [
                { "category": "PostgreSQLLogs", "enabled": true },
                { "category": "PostgreSQLFlexSessions", "enabled": true }
            ],
            "metrics": [{ "category": "AllMetrics", "enabled": true }]
        }));
        Ok(vec![spec])
    }
}
