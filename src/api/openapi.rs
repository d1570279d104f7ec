//! OpenAPI documentation and schema generation
//!
//! This module defines the OpenAPI specification for the upload-relay REST API
//! using utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the upload-relay REST API
///
/// Served at `/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "upload-relay REST API",
        version = "0.1.0",
        description = "Upload files, poll background processing status, and download completed files",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:8000", description = "Local development server")
    ),
    paths(
        crate::api::routes::upload_file,
        crate::api::routes::get_status,
        crate::api::routes::download_file,
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
    ),
    components(
        schemas(
            crate::types::TaskId,
            crate::types::TaskStatus,
            crate::types::Task,
            crate::types::UploadResponse,
            crate::types::HealthResponse,
            crate::error::ApiError,
            crate::error::ErrorDetail,
        )
    ),
    tags(
        (name = "tasks", description = "Upload, status polling and download"),
        (name = "system", description = "Health and API documentation")
    )
)]
pub struct ApiDoc;
