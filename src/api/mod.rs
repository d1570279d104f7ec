//! REST API server module
//!
//! Provides the HTTP surface of the service: file upload, status polling,
//! download of processed files, health, and the OpenAPI document.

use crate::Result;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, header},
    routing::{get, post},
};
use std::future::Future;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Largest accepted request body (multipart uploads)
pub const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Tasks
/// - `POST /upload/` (also `/upload`) - Upload a file, returns a task id
/// - `GET /status/:task_id` - Poll task state
/// - `GET /download/:task_id` - Download the file of a completed task
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config.cors.allowed_origins);

    Router::new()
        // Tasks
        .route("/upload/", post(routes::upload_file))
        .route("/upload", post(routes::upload_file))
        .route("/status/:task_id", get(routes::get_status))
        .route("/download/:task_id", get(routes::download_file))
        // System
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Build a CORS layer based on configured origins
///
/// `"*"` anywhere in the list, or an empty list, allows any origin without
/// credentials. An explicit list allows credentials and mirrors the requested
/// methods and headers.
/// `Content-Disposition` is exposed so browser clients can read download names.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    let layer = if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %o, "Ignoring unparsable CORS origin");
                    None
                }
            })
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(AllowMethods::mirror_request())
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(true)
    };

    layer.expose_headers([header::CONTENT_DISPOSITION])
}

/// Start the API server on the configured bind address.
///
/// Serves until `shutdown` resolves, then lets in-flight requests finish.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn start_api_server<F>(state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let bind_address = state.config.bind_address()?;

    tracing::info!(
        address = %bind_address,
        "Starting API server"
    );

    let app = create_router(state);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(
        address = %bind_address,
        "API server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
