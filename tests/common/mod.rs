//! Common test utilities for upload-relay integration tests

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, Response, StatusCode, header};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use upload_relay::api::{AppState, create_router};
use upload_relay::processor::{ExternalProcessor, build_processor};
use upload_relay::{Config, InMemoryTaskStore, RunnerSettings, TaskRunner, TaskStore};

const BOUNDARY: &str = "----UploadRelayIntegrationBoundary";

/// Config with short processing times rooted at `upload_dir`
pub fn fast_config(upload_dir: &Path) -> Config {
    let mut config = Config::default();
    config.application.upload_directory = upload_dir.to_path_buf();
    config.application.processing_steps = 5;
    config.application.external_processing_estimated_duration = Duration::from_millis(100);
    config.application.external_processing_timeout = Duration::from_secs(5);
    config.application.simulated_call_delay = Duration::from_millis(30);
    config
}

/// Router over a ready in-memory store, wired the same way the binary does it
pub async fn test_app(config: Config) -> (Router, AppState) {
    let processor = build_processor(&config.application);
    test_app_with_processor(config, processor).await
}

/// Router over a ready in-memory store with a caller-supplied processor
pub async fn test_app_with_processor(
    config: Config,
    processor: Arc<dyn ExternalProcessor>,
) -> (Router, AppState) {
    let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
    store.initialize().await.unwrap();

    let runner = TaskRunner::new(
        store.clone(),
        processor,
        RunnerSettings::from_config(&config.application),
    );
    let state = AppState::new(store, runner, Arc::new(config));
    (create_router(state.clone()), state)
}

/// Upload `contents` as `filename`, returning the task id
pub async fn upload(app: &Router, filename: &str, contents: &[u8]) -> String {
    let mut body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\n\
         Content-Type: application/octet-stream\r\n\
         \r\n"
    )
    .into_bytes();
    body.extend_from_slice(contents);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    let request = Request::builder()
        .method("POST")
        .uri("/upload/")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let json = json_body(response).await;
    json["task_id"].as_str().unwrap().to_string()
}

/// GET a path through the router
pub async fn get(app: &Router, uri: &str) -> Response<Body> {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    app.clone().oneshot(request).await.unwrap()
}

/// Poll `/status/{id}` until the task is terminal, returning every snapshot seen
pub async fn poll_until_terminal(app: &Router, task_id: &str) -> Vec<serde_json::Value> {
    let mut snapshots = Vec::new();
    for _ in 0..500 {
        let response = get(app, &format!("/status/{task_id}")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let snapshot = json_body(response).await;
        let status = snapshot["status"].as_str().unwrap().to_string();
        snapshots.push(snapshot);
        if status == "complete" || status == "error" {
            return snapshots;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("task {task_id} did not finish: {snapshots:?}");
}

/// Parse a JSON response body
pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).expect("Response should be valid JSON")
}
