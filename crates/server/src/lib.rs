pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Landing Zone API",
        version = "0.1.0",
        description = "Provisioning and teardown of cloud landing zones"
    ),
    paths(
        routes::health_check,
        routes::list_definitions,
        routes::create_landing_zone,
        routes::list_landing_zones,
        routes::get_landing_zone,
        routes::list_landing_zone_resources,
        routes::get_deletion_plan,
        routes::delete_landing_zone,
        routes::get_job,
        routes::sse::events_stream,
    ),
    components(schemas(
        routes::HealthResponse,
        routes::DeleteLandingZoneResponse,
        error::ErrorResponse,
        orchestrator::CreateJob,
        orchestrator::JobReport,
        orchestrator::LandingZoneDefinition,
        orchestrator::LandingZoneProfile,
        orchestrator::StepKind,
        orchestrator::DeletionPlan,
        orchestrator::ResourceToDelete,
        orchestrator::Violation,
        landing_zone_core::LandingZoneRequest,
        landing_zone_core::LandingZone,
        landing_zone_core::ContainerRef,
        landing_zone_core::ManagedResource,
        landing_zone_core::DeployedLandingZone,
        landing_zone_core::FlightStatus,
    )),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "definitions", description = "Deployable landing zone profiles"),
        (name = "landing-zones", description = "Landing zone provisioning and teardown"),
        (name = "jobs", description = "Asynchronous create jobs"),
        (name = "events", description = "Real-time event streaming (SSE)"),
    )
)]
pub struct ApiDoc;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/health", get(routes::health_check))
        .route("/api/definitions", get(routes::list_definitions))
        .route(
            "/api/landing-zones",
            get(routes::list_landing_zones).post(routes::create_landing_zone),
        )
        .route(
            "/api/landing-zones/{id}",
            get(routes::get_landing_zone).delete(routes::delete_landing_zone),
        )
        .route(
            "/api/landing-zones/{id}/resources",
            get(routes::list_landing_zone_resources),
        )
        .route(
            "/api/landing-zones/{id}/deletion-plan",
            get(routes::get_deletion_plan),
        )
        .route("/api/jobs/{id}", get(routes::get_job))
        .route("/api/events", get(routes::sse::events_stream))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves the API until the process is stopped, resuming interrupted
/// flights first.
pub async fn serve(state: AppState, port: u16) -> anyhow::Result<()> {
    state.service.recover().await?;

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(address = %listener.local_addr()?, "Server listening");
    axum::serve(listener, create_router(state)).await?;
    Ok(())
}
