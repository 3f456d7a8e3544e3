//! HTTP route handlers for the status and administration API.

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use poker::io::config_store::{DeclaredEntry, DuplicateServiceError, add_entry, validate_service_id};
use poker::view::{ScheduleSnapshot, ServiceSnapshot};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::state::AppState;

/// Build the API router.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(get_status))
        .route("/services", get(list_services).post(add_service))
}

async fn health() -> &'static str {
    "ok"
}

/// GET /api/status - engine status and next scheduled pass.
async fn get_status(State(state): State<AppState>) -> Json<ScheduleSnapshot> {
    Json(state.view.schedule())
}

/// GET /api/services - known services with their current status.
async fn list_services(State(state): State<AppState>) -> Json<Vec<ServiceSnapshot>> {
    Json(state.view.services())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NewService {
    id: String,
    repository: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
}

/// POST /api/services - append a service to the declared configuration.
///
/// The engine picks it up on its next pass.
async fn add_service(
    State(state): State<AppState>,
    Json(body): Json<NewService>,
) -> Result<(StatusCode, Json<NewService>), ApiError> {
    validate_service_id(&body.id)
        .map_err(|err| api_error(StatusCode::BAD_REQUEST, err.to_string()))?;
    if body.repository.trim().is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "repository must not be empty"));
    }

    let entry = DeclaredEntry::new(body.id.clone(), body.repository.trim());
    if let Err(err) = add_entry(&state.config_file, entry) {
        if err.downcast_ref::<DuplicateServiceError>().is_some() {
            return Err(api_error(StatusCode::CONFLICT, err.to_string()));
        }
        warn!(err = %format!("{err:#}"), "unable to add service");
        return Err(api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("{err:#}"),
        ));
    }

    info!(service = %body.id, url = %body.repository, "service declared");
    Ok((StatusCode::CREATED, Json(body)))
}
