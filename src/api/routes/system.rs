//! System handlers: health, OpenAPI.

use crate::api::AppState;
use crate::types::HealthResponse;
use axum::{Json, extract::State, response::IntoResponse};

/// GET /health - Health check
///
/// Always answers 200; `status` tells whether the store is ready yet.
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses(
        (status = 200, description = "Service state", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let response = if state.store.is_ready() {
        HealthResponse {
            status: "running".to_string(),
            message: "Service running.".to_string(),
            storage_type: Some(state.store.kind().to_string()),
        }
    } else {
        HealthResponse {
            status: "initializing".to_string(),
            message: "Service starting...".to_string(),
            storage_type: None,
        }
    };
    Json(response)
}

/// GET /openapi.json - OpenAPI specification
#[utoipa::path(
    get,
    path = "/openapi.json",
    tag = "system",
    responses(
        (status = 200, description = "OpenAPI specification in JSON format")
    )
)]
pub async fn openapi_spec() -> impl IntoResponse {
    use crate::api::openapi::ApiDoc;
    use utoipa::OpenApi;

    Json(ApiDoc::openapi())
}
