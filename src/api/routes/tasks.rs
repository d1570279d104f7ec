//! Task handlers: upload, status, download.

use crate::api::AppState;
use crate::error::{Error, Result, TaskError};
use crate::types::{Task, TaskId, TaskStatus, UploadResponse};
use crate::utils;
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::IntoResponse,
};
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio_util::io::ReaderStream;

/// POST /upload/ - Accept a file and start processing it in the background
#[utoipa::path(
    post,
    path = "/upload/",
    tag = "tasks",
    request_body(content = Vec<u8>, description = "File upload (multipart/form-data, field `file`)", content_type = "multipart/form-data"),
    responses(
        (status = 202, description = "File stored and processing delegated", body = UploadResponse),
        (status = 400, description = "No usable file in the request", body = crate::error::ApiError),
        (status = 500, description = "File could not be stored", body = crate::error::ApiError),
        (status = 503, description = "Service not ready", body = crate::error::ApiError)
    )
)]
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    state.ensure_ready()?;
    if state.runner.is_shutting_down() {
        return Err(Error::ShuttingDown);
    }

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidUpload(format!("malformed multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .ok_or_else(|| Error::InvalidUpload("file field has no filename".to_string()))?;
        let contents = field
            .bytes()
            .await
            .map_err(|e| Error::InvalidUpload(format!("failed to read file: {}", e)))?;

        upload = Some((filename, contents));
        break;
    }

    let (filename, contents) = upload
        .ok_or_else(|| Error::InvalidUpload("no file provided in 'file' field".to_string()))?;

    let path = utils::write_new_upload(
        &state.config.application.upload_directory,
        &filename,
        chrono::Utc::now().timestamp(),
        &contents,
    )
    .await?;

    let task = state
        .store
        .create(&path.to_string_lossy(), &filename)
        .await?;
    state.runner.spawn(task.task_id);

    tracing::info!(
        task_id = %task.task_id,
        file = %filename,
        path = %path.display(),
        bytes = contents.len(),
        "Upload accepted"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(UploadResponse {
            task_id: task.task_id,
            message: format!("File '{}' received. Processing delegated.", filename),
            filename,
        }),
    ))
}

/// GET /status/:task_id - Current state of a task
#[utoipa::path(
    get,
    path = "/status/{task_id}",
    tag = "tasks",
    params(
        ("task_id" = String, Path, description = "Task identifier returned by the upload")
    ),
    responses(
        (status = 200, description = "Task record", body = Task),
        (status = 404, description = "Unknown task", body = crate::error::ApiError),
        (status = 503, description = "Service not ready", body = crate::error::ApiError)
    )
)]
pub async fn get_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Json<Task>> {
    state.ensure_ready()?;
    let task = find_task(&state, &task_id).await?;
    Ok(Json(task))
}

/// GET /download/:task_id - The stored file of a completed task
#[utoipa::path(
    get,
    path = "/download/{task_id}",
    tag = "tasks",
    params(
        ("task_id" = String, Path, description = "Task identifier returned by the upload")
    ),
    responses(
        (status = 200, description = "File contents as an attachment", content_type = "application/octet-stream"),
        (status = 400, description = "Task has not completed", body = crate::error::ApiError),
        (status = 404, description = "Unknown task or file missing on disk", body = crate::error::ApiError),
        (status = 503, description = "Service not ready", body = crate::error::ApiError)
    )
)]
pub async fn download_file(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<impl IntoResponse> {
    state.ensure_ready()?;
    let task = find_task(&state, &task_id).await?;

    if task.status != TaskStatus::Complete {
        return Err(TaskError::NotComplete {
            id: task.task_id,
            status: task.status,
        }
        .into());
    }

    let path = PathBuf::from(&task.file_location);
    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::warn!(
                task_id = %task.task_id,
                path = %path.display(),
                "Processed file missing on disk"
            );
            return Err(TaskError::FileMissing {
                id: task.task_id,
                path,
            }
            .into());
        }
        Err(e) => return Err(e.into()),
    };

    tracing::debug!(task_id = %task.task_id, file = %task.original_filename, "Serving download");

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                utils::content_disposition(&task.original_filename),
            ),
        ],
        Body::from_stream(ReaderStream::new(file)),
    ))
}

/// Look up a task by its textual id; anything unparsable is simply unknown
async fn find_task(state: &AppState, raw_id: &str) -> Result<Task> {
    let not_found = || {
        Error::Task(TaskError::NotFound {
            id: raw_id.to_string(),
        })
    };

    let id: TaskId = raw_id.parse().map_err(|_| not_found())?;
    state.store.get(id).await?.ok_or_else(not_found)
}
