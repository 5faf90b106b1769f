mod common;

use axum::body::to_bytes;
use axum::http::{Method, StatusCode};

use common::app::spawn_test_server;
use common::http::{assert_json_error, request, response_json};

#[tokio::test]
async fn it_root_welcome_text() {
    let app = spawn_test_server().await;

    let response = request(&app.app, Method::GET, "/", None, &[]).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains("Welcome"));
}

#[tokio::test]
async fn it_health_live_and_ready() {
    let app = spawn_test_server().await;

    let live = request(&app.app, Method::GET, "/health/live", None, &[]).await;
    assert_eq!(live.status(), StatusCode::OK);

    let ready = request(&app.app, Method::GET, "/health/ready", None, &[]).await;
    assert_eq!(ready.status(), StatusCode::OK);

    app.state.cancel_token().cancel();
    let draining = request(&app.app, Method::GET, "/health/ready", None, &[]).await;
    assert_eq!(draining.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn it_health_database_reports_word_count() {
    let app = spawn_test_server().await;

    let _ = request(&app.app, Method::GET, "/api/words/quartz", None, &[]).await;
    let db = request(&app.app, Method::GET, "/health/database", None, &[]).await;
    let (status, _, body) = response_json(db).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["healthy"], true);
    assert_eq!(body["wordCount"], 1);

    let summary = request(&app.app, Method::GET, "/health", None, &[]).await;
    let (status, _, body) = response_json(summary).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn it_unknown_route_is_json_404_with_trace_id() {
    let app = spawn_test_server().await;

    let response = request(
        &app.app,
        Method::GET,
        "/api/nope",
        None,
        &[("x-request-id", "trace-abc-123".to_string())],
    )
    .await;
    let (status, headers, body) = response_json(response).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_json_error(&body, "NOT_FOUND");
    assert_eq!(body["traceId"], "trace-abc-123");
    assert_eq!(headers["x-request-id"], "trace-abc-123");
}

#[tokio::test]
async fn it_security_headers_are_set() {
    let app = spawn_test_server().await;

    let response = request(&app.app, Method::GET, "/health/live", None, &[]).await;
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert_eq!(response.headers()["x-frame-options"], "DENY");
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn it_malformed_json_body_is_400() {
    let app = spawn_test_server().await;

    let req = axum::http::Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{not json"))
        .unwrap();
    let response = tower::ServiceExt::oneshot(app.app.clone(), req).await.unwrap();
    let (status, _, body) = response_json(response).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}
