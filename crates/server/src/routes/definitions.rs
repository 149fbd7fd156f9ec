use axum::extract::State;
use axum::Json;
use orchestrator::LandingZoneDefinition;

use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/definitions",
    responses(
        (status = 200, description = "Deployable landing zone profiles", body = Vec<LandingZoneDefinition>)
    ),
    tag = "definitions"
)]
pub async fn list_definitions(State(state): State<AppState>) -> Json<Vec<LandingZoneDefinition>> {
    Json(state.service.definitions())
}
