use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use landing_zone_core::{LandingZone, LandingZoneRequest, ManagedResource};
use orchestrator::{CreateJob, DeletionPlan};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::{AppError, ErrorResponse};
use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
pub struct DeleteLandingZoneResponse {
    pub landing_zone_id: Uuid,
    /// Resources deleted, in deletion order
    pub deleted: Vec<ManagedResource>,
}

/// Starts provisioning; poll the returned job for the outcome.
#[utoipa::path(
    post,
    path = "/api/landing-zones",
    request_body = LandingZoneRequest,
    responses(
        (status = 202, description = "Creation started", body = CreateJob),
        (status = 400, description = "Invalid request", body = ErrorResponse),
    ),
    tag = "landing-zones"
)]
pub async fn create_landing_zone(
    State(state): State<AppState>,
    Json(payload): Json<LandingZoneRequest>,
) -> Result<(StatusCode, Json<CreateJob>), AppError> {
    if payload.definition.trim().is_empty() {
        return Err(AppError::BadRequest("Definition cannot be empty".to_string()));
    }

    let job = state.service.start_create(payload).await?;
    Ok((StatusCode::ACCEPTED, Json(job)))
}

#[utoipa::path(
    get,
    path = "/api/landing-zones",
    responses(
        (status = 200, description = "Recorded landing zones", body = Vec<LandingZone>)
    ),
    tag = "landing-zones"
)]
pub async fn list_landing_zones(
    State(state): State<AppState>,
) -> Result<Json<Vec<LandingZone>>, AppError> {
    Ok(Json(state.service.list_landing_zones().await?))
}

#[utoipa::path(
    get,
    path = "/api/landing-zones/{id}",
    params(
        ("id" = Uuid, Path, description = "Landing zone ID"),
    ),
    responses(
        (status = 200, description = "Landing zone", body = LandingZone),
        (status = 404, description = "Landing zone not found", body = ErrorResponse),
    ),
    tag = "landing-zones"
)]
pub async fn get_landing_zone(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<LandingZone>, AppError> {
    Ok(Json(state.service.get_landing_zone(id).await?))
}

#[utoipa::path(
    get,
    path = "/api/landing-zones/{id}/resources",
    params(
        ("id" = Uuid, Path, description = "Landing zone ID"),
    ),
    responses(
        (status = 200, description = "Resources tagged with the landing zone", body = Vec<ManagedResource>),
        (status = 404, description = "Landing zone not found", body = ErrorResponse),
    ),
    tag = "landing-zones"
)]
pub async fn list_landing_zone_resources(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ManagedResource>>, AppError> {
    Ok(Json(state.service.list_resources(id).await?))
}

#[utoipa::path(
    get,
    path = "/api/landing-zones/{id}/deletion-plan",
    params(
        ("id" = Uuid, Path, description = "Landing zone ID"),
    ),
    responses(
        (status = 200, description = "What a deletion would remove", body = DeletionPlan),
        (status = 404, description = "Landing zone not found", body = ErrorResponse),
    ),
    tag = "landing-zones"
)]
pub async fn get_deletion_plan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeletionPlan>, AppError> {
    Ok(Json(state.service.plan_deletion(id).await?))
}

/// Deletes every resource of the landing zone, or none when a delete rule
/// objects.
#[utoipa::path(
    delete,
    path = "/api/landing-zones/{id}",
    params(
        ("id" = Uuid, Path, description = "Landing zone ID"),
    ),
    responses(
        (status = 200, description = "Landing zone deleted", body = DeleteLandingZoneResponse),
        (status = 404, description = "Landing zone not found", body = ErrorResponse),
        (status = 409, description = "Blocked by delete rules or already being deleted", body = ErrorResponse),
    ),
    tag = "landing-zones"
)]
pub async fn delete_landing_zone(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteLandingZoneResponse>, AppError> {
    let deleted = state.service.delete_landing_zone(id).await?;
    Ok(Json(DeleteLandingZoneResponse {
        landing_zone_id: id,
        deleted,
    }))
}
