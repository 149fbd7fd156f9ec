use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use cloud::{CallKind, CloudError, InMemoryResourceManager, ResourceDirectory, ResourceManager};
use db::DeletionLockRepository;
use landing_zone_core::resource_types;
use landing_zone_core::{
    ContainerRef, FlightClass, FlightMap, FlightRecord, FlightStatus, LandingZoneRequest,
    ManagedResource,
};
use orchestrator::flight::{FlightContext, Step};
use orchestrator::steps::{keys, CreateResourceStep, CreateVnet};
use orchestrator::{
    JobReport, LandingZoneService, OrchestratorConfig, OrchestratorError, ProtectedDataConfig,
};
use serde_json::json;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const STORAGE_ACCOUNT: &str =
    "/subscriptions/00000000-0000-0000-0000-000000000001/resourceGroups/logs/providers/Microsoft.Storage/storageAccounts/ltlogs";

fn container() -> ContainerRef {
    ContainerRef {
        tenant_id: Uuid::new_v4(),
        subscription_id: Uuid::new_v4(),
        resource_group: "mrg".to_string(),
        region: "eastus".to_string(),
    }
}

fn config() -> OrchestratorConfig {
    OrchestratorConfig::default()
        .with_poll_interval(Duration::from_secs(1))
        .with_poll_cycles(60)
        .with_protected_data(
            ProtectedDataConfig::default().with_storage_account("eastus", STORAGE_ACCOUNT),
        )
}

async fn pool() -> SqlitePool {
    let pool = db::create_pool("sqlite::memory:").await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    pool
}

async fn service(manager: &Arc<InMemoryResourceManager>) -> (LandingZoneService, SqlitePool) {
    let pool = pool().await;
    let service = LandingZoneService::new(manager.clone(), pool.clone(), config(), None);
    (service, pool)
}

async fn wait_for_job(service: &LandingZoneService, job_id: Uuid) -> JobReport {
    tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            let report = service.job(job_id).await.unwrap();
            if report.status.is_terminal() {
                return report;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("job did not finish")
}

async fn tagged(manager: &Arc<InMemoryResourceManager>, container: &ContainerRef, id: Uuid) -> Vec<ManagedResource> {
    ResourceDirectory::new(manager.clone())
        .list_by_tag(container, "WLZ-ID", &id.to_string())
        .await
        .unwrap()
}

fn ids(resources: &[ManagedResource]) -> HashSet<String> {
    resources.iter().map(|r| r.id.to_ascii_lowercase()).collect()
}

#[tokio::test]
async fn test_base_landing_zone_round_trip() {
    let manager = Arc::new(InMemoryResourceManager::new());
    let (service, _pool) = service(&manager).await;
    let container = container();

    let job = service
        .start_create(LandingZoneRequest::new("base", container.clone()))
        .await
        .unwrap();
    let report = wait_for_job(&service, job.job_id).await;

    assert_eq!(report.status, FlightStatus::Success, "{:?}", report.error);
    let deployed = report.result.unwrap();
    assert_eq!(deployed.id, job.landing_zone_id);
    let types: Vec<_> = deployed.resources.iter().map(|r| r.resource_type.as_str()).collect();
    assert_eq!(
        types,
        vec![
            resource_types::VIRTUAL_NETWORK,
            resource_types::POSTGRES_FLEXIBLE_SERVER,
            resource_types::PRIVATE_ENDPOINT,
            resource_types::PRIVATE_DNS_ZONE,
            resource_types::VIRTUAL_NETWORK_LINK,
        ]
    );

    // Everything created is discoverable by tag
    let listed = service.list_resources(job.landing_zone_id).await.unwrap();
    assert_eq!(ids(&listed), ids(&deployed.resources));
    assert_eq!(service.list_landing_zones().await.unwrap().len(), 1);

    let deleted = service.delete_landing_zone(job.landing_zone_id).await.unwrap();

    assert_eq!(deleted.len(), 5);
    assert!(tagged(&manager, &container, job.landing_zone_id).await.is_empty());
    assert!(matches!(
        service.get_landing_zone(job.landing_zone_id).await,
        Err(OrchestratorError::LandingZoneNotFound(_))
    ));
}

#[tokio::test]
async fn test_protected_data_deletion_removes_untagged_solution() {
    let manager = Arc::new(InMemoryResourceManager::new().with_sentinel_solutions());
    let (service, _pool) = service(&manager).await;

    let job = service
        .start_create(LandingZoneRequest::new("protected_data", container()))
        .await
        .unwrap();
    let report = wait_for_job(&service, job.job_id).await;

    assert_eq!(report.status, FlightStatus::Success, "{:?}", report.error);
    let deployed = report.result.unwrap();
    // 5 base + workspace, export, onboarding, two alert rules, diagnostic setting
    assert_eq!(deployed.resources.len(), 11);
    let solutions: Vec<_> = manager
        .resources()
        .into_iter()
        .filter(|r| r.is_type(resource_types::SOLUTION))
        .collect();
    assert_eq!(solutions.len(), 1);
    assert!(solutions[0].tags.is_empty());

    let plan = service.plan_deletion(job.landing_zone_id).await.unwrap();
    let workspace = plan
        .foundational
        .iter()
        .find(|r| r.resource.is_type(resource_types::LOG_ANALYTICS_WORKSPACE))
        .unwrap();
    assert_eq!(workspace.solutions.len(), 1);

    service.delete_landing_zone(job.landing_zone_id).await.unwrap();

    assert!(manager.resources().is_empty());
}

#[tokio::test]
async fn test_failed_step_rolls_back_everything() {
    let manager = Arc::new(InMemoryResourceManager::new());
    manager.inject_failure(
        CallKind::Create,
        "pe-pg",
        CloudError::Rejected {
            status: 400,
            code: Some("SubnetNotFound".to_string()),
            message: "subnet rejected".to_string(),
        },
        1,
    );
    let (service, _pool) = service(&manager).await;
    let container = container();

    let job = service
        .start_create(LandingZoneRequest::new("base", container.clone()))
        .await
        .unwrap();
    let report = wait_for_job(&service, job.job_id).await;

    assert_eq!(report.status, FlightStatus::Error);
    assert!(report.error.unwrap().contains("subnet rejected"));
    assert!(report.result.is_none());
    assert!(tagged(&manager, &container, job.landing_zone_id).await.is_empty());
    assert!(manager.resources().is_empty());
    assert!(service.get_landing_zone(job.landing_zone_id).await.is_err());
}

#[tokio::test]
async fn test_failed_record_step_deletes_provisioned_resources() {
    let manager = Arc::new(InMemoryResourceManager::new());
    let (service, pool) = service(&manager).await;
    sqlx::query(
        "CREATE TRIGGER reject_landing_zones BEFORE INSERT ON landing_zones \
         BEGIN SELECT RAISE(ABORT, 'landing zone table is read-only'); END",
    )
    .execute(&pool)
    .await
    .unwrap();
    let container = container();

    let job = service
        .start_create(LandingZoneRequest::new("base", container.clone()))
        .await
        .unwrap();
    // The record step spends its short_exponential retries (~15s) first
    let report = wait_for_job(&service, job.job_id).await;

    assert_eq!(report.status, FlightStatus::Error, "{:?}", report.error);
    assert!(report.error.unwrap().contains("read-only"));
    assert!(tagged(&manager, &container, job.landing_zone_id).await.is_empty());
    assert!(manager.resources().is_empty());
    assert_eq!(manager.delete_calls().len(), 5);
}

#[tokio::test]
async fn test_attach_mode_only_records_the_landing_zone() {
    let manager = Arc::new(InMemoryResourceManager::new());
    let (service, _pool) = service(&manager).await;

    let job = service
        .start_create(LandingZoneRequest::new("base", container()).with_parameter("attach", "true"))
        .await
        .unwrap();
    let report = wait_for_job(&service, job.job_id).await;

    assert_eq!(report.status, FlightStatus::Success);
    assert_eq!(manager.create_calls(), 0);
    assert!(service.get_landing_zone(job.landing_zone_id).await.is_ok());
}

#[tokio::test]
async fn test_invalid_requests_are_rejected_up_front() {
    let manager = Arc::new(InMemoryResourceManager::new());
    let pool = pool().await;
    let service = LandingZoneService::new(
        manager.clone(),
        pool,
        OrchestratorConfig::default(),
        None,
    );

    let unknown = service
        .start_create(LandingZoneRequest::new("cromwell", container()))
        .await;
    assert!(matches!(unknown, Err(OrchestratorError::UnknownDefinition(_))));

    // No storage account configured for the region
    let unconfigured = service
        .start_create(LandingZoneRequest::new("protected_data", container()))
        .await;
    assert!(matches!(unconfigured, Err(OrchestratorError::Configuration(_))));

    let id = Uuid::new_v4();
    let mut request = LandingZoneRequest::new("base", container()).with_parameter("attach", "true");
    request.landing_zone_id = Some(id);
    let job = service.start_create(request.clone()).await.unwrap();
    wait_for_job(&service, job.job_id).await;
    let duplicate = service.start_create(request).await;
    assert!(matches!(duplicate, Err(OrchestratorError::Core(_))));
}

#[tokio::test]
async fn test_blocked_deletion_issues_no_deletes() {
    let manager = Arc::new(InMemoryResourceManager::new());
    let (service, _pool) = service(&manager).await;
    let job = service
        .start_create(LandingZoneRequest::new("base", container()))
        .await
        .unwrap();
    let deployed = wait_for_job(&service, job.job_id).await.result.unwrap();

    // Someone created a database on the server since
    let server = deployed
        .resources
        .iter()
        .find(|r| r.is_type(resource_types::POSTGRES_FLEXIBLE_SERVER))
        .unwrap()
        .clone();
    manager.delete_by_id(&server.id).await.unwrap();
    manager.insert(ManagedResource {
        properties: json!({"databases": ["postgres", "orders"]}),
        ..server
    });
    let deletes_before = manager.delete_calls().len();

    let err = service.delete_landing_zone(job.landing_zone_id).await.unwrap_err();

    assert!(matches!(err, OrchestratorError::DeletionBlocked { .. }));
    assert_eq!(manager.delete_calls().len(), deletes_before);
    assert_eq!(service.list_resources(job.landing_zone_id).await.unwrap().len(), 5);
}

#[tokio::test]
async fn test_concurrent_deletion_is_refused() {
    let manager = Arc::new(InMemoryResourceManager::new());
    let (service, pool) = service(&manager).await;
    let job = service
        .start_create(LandingZoneRequest::new("base", container()).with_parameter("attach", "true"))
        .await
        .unwrap();
    wait_for_job(&service, job.job_id).await;

    let locks = DeletionLockRepository::new(pool);
    assert!(locks.try_acquire(job.landing_zone_id, "other-worker").await.unwrap());

    let err = service.delete_landing_zone(job.landing_zone_id).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::DeletionInProgress(_)));

    locks.release(job.landing_zone_id, "other-worker").await.unwrap();
    assert!(service.delete_landing_zone(job.landing_zone_id).await.is_ok());
}

fn resources_context(container: &ContainerRef) -> FlightContext {
    let landing_zone_id = Uuid::new_v4();
    let mut input = FlightMap::new();
    input.put(keys::LANDING_ZONE_ID, &landing_zone_id).unwrap();
    input
        .put(keys::REQUEST, &LandingZoneRequest::new("base", container.clone()))
        .unwrap();
    let record = FlightRecord::new(Uuid::new_v4(), FlightClass::LandingZoneResources, input);
    FlightContext::new(record, CancellationToken::new())
}

#[tokio::test]
async fn test_create_step_is_idempotent() {
    let manager = Arc::new(InMemoryResourceManager::new());
    let container = container();
    let step = CreateResourceStep::new(CreateVnet, manager.clone());
    let mut ctx = resources_context(&container);

    assert!(step.do_step(&mut ctx).await.is_success());
    assert!(step.do_step(&mut ctx).await.is_success());
    assert_eq!(manager.resources().len(), 1);
    assert_eq!(manager.create_calls(), 1);

    // Progress lost, e.g. a crash before the state was saved: adopt
    let mut fresh = FlightContext::new(
        FlightRecord::new(Uuid::new_v4(), FlightClass::LandingZoneResources, ctx.input().clone()),
        CancellationToken::new(),
    );
    assert!(step.do_step(&mut fresh).await.is_success());
    assert_eq!(manager.resources().len(), 1);
    let adopted: Vec<ManagedResource> = fresh.working().require(keys::VNET).unwrap();
    assert_eq!(adopted[0].id, manager.resources()[0].id);
}

#[tokio::test]
async fn test_create_step_undo_tolerates_missing_resources() {
    let manager = Arc::new(InMemoryResourceManager::new());
    let container = container();
    let step = CreateResourceStep::new(CreateVnet, manager.clone());
    let mut ctx = resources_context(&container);

    // Undo before anything was created is a no-op
    assert!(step.undo_step(&mut ctx).await.is_success());

    step.do_step(&mut ctx).await;
    let vnet = manager.resources()[0].id.clone();
    manager.delete_by_id(&vnet).await.unwrap();

    assert!(step.undo_step(&mut ctx).await.is_success());
    assert!(!ctx.working().contains(keys::VNET));
}
