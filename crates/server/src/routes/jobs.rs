use axum::extract::{Path, State};
use axum::Json;
use orchestrator::JobReport;
use uuid::Uuid;

use crate::error::{AppError, ErrorResponse};
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/jobs/{id}",
    params(
        ("id" = Uuid, Path, description = "Job ID returned by the create call"),
    ),
    responses(
        (status = 200, description = "Job status", body = JobReport),
        (status = 404, description = "Job not found", body = ErrorResponse),
    ),
    tag = "jobs"
)]
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobReport>, AppError> {
    Ok(Json(state.service.job(id).await?))
}
