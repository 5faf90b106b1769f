pub mod admin;
pub mod auth;
pub mod health;
pub mod subjects;
pub mod words;

use std::any::Any;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, Any as CorsAny, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::request_id;
use crate::response::ErrorBody;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let cors_origin = state.config().cors_origin.clone();
    let api_routes = Router::new()
        .nest("/auth", auth::router())
        .nest("/words", words::router())
        .route("/word-of-the-day", get(words::word_of_the_day))
        .nest("/admin", admin::router())
        .nest("/subjects", subjects::router())
        .layer(DefaultBodyLimit::max(state.config().max_upload_bytes));

    let routes = Router::new()
        .route("/", get(welcome))
        .nest("/api", api_routes)
        .nest("/health", health::router())
        .fallback(fallback_404)
        .with_state(state);

    with_middleware(routes, &cors_origin)
}

/// Panics inside handlers are caught below the request id layer so the 500
/// body carries a traceId. The outer catcher covers the middleware itself.
fn with_middleware(routes: Router, cors_origin: &str) -> Router {
    routes
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(axum::middleware::from_fn(request_id::request_id_middleware))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(cors_layer(cors_origin))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(panic_response))
}

fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = detail, "handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            success: false,
            code: "INTERNAL_ERROR".to_string(),
            message: "Internal server error".to_string(),
            trace_id: None,
        }),
    )
        .into_response()
}

fn cors_layer(origin: &str) -> CorsLayer {
    let allow_origin = match origin.trim() {
        "" | "*" => AllowOrigin::from(CorsAny),
        list => {
            let origins: Vec<HeaderValue> = list
                .split(',')
                .filter_map(|o| HeaderValue::from_str(o.trim()).ok())
                .collect();
            AllowOrigin::list(origins)
        }
    };
    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(CorsAny)
        .allow_headers(CorsAny)
}

async fn welcome() -> &'static str {
    "Welcome to the vocabulary API"
}

async fn fallback_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody {
            success: false,
            code: "NOT_FOUND".to_string(),
            message: "Not found".to_string(),
            trace_id: None,
        }),
    )
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::util::ServiceExt;

    use super::*;
    use crate::middleware::request_id::REQUEST_ID_HEADER;

    async fn boom() -> &'static str {
        panic!("secret detail")
    }

    #[tokio::test]
    async fn handler_panic_is_json_error_with_trace_id() {
        let app = with_middleware(Router::new().route("/boom", get(boom)), "*");

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/boom")
                    .header(REQUEST_ID_HEADER, "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "req-42");
        assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["code"], "INTERNAL_ERROR");
        assert_eq!(body["traceId"], "req-42");
        assert!(!body["message"].as_str().unwrap().contains("secret"));
    }
}
