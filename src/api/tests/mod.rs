use super::*;
use crate::config::Config;
use crate::processor::SimulatedProcessor;
use crate::runner::{RunnerSettings, TaskRunner};
use crate::store::{InMemoryTaskStore, TaskStore};
use axum::body::{Body, to_bytes};
use axum::http::{Request, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tempfile::{TempDir, tempdir};
use tower::ServiceExt;


const BOUNDARY: &str = "----UploadRelayTestBoundary7MA4YWxk";

/// Build app state over a temp upload directory with fast processing settings
async fn test_state(ready: bool) -> (AppState, TempDir) {
    let temp_dir = tempdir().unwrap();

    let mut config = Config::default();
    config.application.upload_directory = temp_dir.path().to_path_buf();
    config.application.processing_steps = 2;
    config.application.external_processing_estimated_duration = Duration::from_millis(20);
    config.application.simulated_call_delay = Duration::from_millis(5);
    config.cors.allowed_origins = vec!["http://localhost:3000".to_string()];

    let store: Arc<dyn TaskStore> = Arc::new(InMemoryTaskStore::new());
    if ready {
        store.initialize().await.unwrap();
    }
    let runner = TaskRunner::new(
        store.clone(),
        Arc::new(SimulatedProcessor::new(config.application.simulated_call_delay)),
        RunnerSettings::from_config(&config.application),
    );

    (AppState::new(store, runner, Arc::new(config)), temp_dir)
}

/// Multipart request body with a single field
fn multipart_request(
    uri: &str,
    field: &str,
    filename: Option<&str>,
    contents: &str,
) -> Request<Body> {
    let disposition = match filename {
        Some(name) => format!("form-data; name=\"{field}\"; filename=\"{name}\""),
        None => format!("form-data; name=\"{field}\""),
    };
    let body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: {disposition}\r\n\
         Content-Type: text/plain\r\n\
         \r\n\
         {contents}\r\n\
         --{BOUNDARY}--\r\n"
    );

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: Response<Body>) -> serde_json::Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).expect("Response should be valid JSON")
}

#[tokio::test]
async fn test_api_server_spawns_and_stops() {
    let (state, _temp_dir) = test_state(true).await;
    let mut config = (*state.config).clone();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0; // OS assigns a free port
    let state = AppState::new(state.store.clone(), state.runner.clone(), Arc::new(config));

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(start_api_server(state, async move {
        let _ = stop_rx.await;
    }));

    tokio::time::sleep(Duration::from_millis(50)).await;
    stop_tx.send(()).unwrap();

    let result = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server should stop after shutdown signal")
        .unwrap();
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_cors_allows_configured_origin_and_exposes_disposition() {
    let (state, _temp_dir) = test_state(true).await;
    let app = create_router(state);

    let request = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:3000"
    );
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
        "true"
    );
    let exposed = headers
        .get(header::ACCESS_CONTROL_EXPOSE_HEADERS)
        .unwrap()
        .to_str()
        .unwrap()
        .to_ascii_lowercase();
    assert!(exposed.contains("content-disposition"));
}

#[tokio::test]
async fn test_cors_preflight_mirrors_requested_method_and_headers() {
    let (state, _temp_dir) = test_state(true).await;
    let app = create_router(state);

    let request = Request::builder()
        .method("OPTIONS")
        .uri("/upload/")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "x-requested-with")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    let headers = response.headers();
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:3000"
    );
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_METHODS).unwrap(),
        "POST"
    );
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_HEADERS).unwrap(),
        "x-requested-with"
    );
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
        "true"
    );
}

#[tokio::test]
async fn test_cors_rejects_unlisted_origin() {
    let (state, _temp_dir) = test_state(true).await;
    let app = create_router(state);

    let request = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "http://evil.example")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none()
    );
}

#[tokio::test]
async fn test_cors_wildcard_allows_any_origin_without_credentials() {
    let (state, _temp_dir) = test_state(true).await;
    let mut config = (*state.config).clone();
    config.cors.allowed_origins = vec!["*".to_string()];
    let state = AppState::new(state.store.clone(), state.runner.clone(), Arc::new(config));
    let app = create_router(state);

    let request = Request::builder()
        .uri("/health")
        .header(header::ORIGIN, "http://anywhere.example")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    let headers = response.headers();
    assert_eq!(headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(), "*");
    assert!(headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).is_none());

    // An empty list takes the same branch
    let _ = build_cors_layer(&[]);
}
