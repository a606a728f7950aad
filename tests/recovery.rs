/// Panic containment through the real layer stack.
mod common;

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    routing::get,
    Router,
};
use tower::util::ServiceExt;
use vid_backend::{app::with_layers, store::MemoryUserStore};

async fn explode() -> &'static str {
    panic!("handler exploded")
}

fn panicking_app() -> Router {
    let state = common::test_state(Arc::new(MemoryUserStore::new()));
    with_layers(Router::new().route("/boom", get(explode)), state)
}

#[tokio::test]
async fn panic_becomes_500_envelope_with_request_id() {
    let response = panicking_app()
        .oneshot(
            Request::builder()
                .uri("/boom")
                .header("x-request-id", "req-42")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        response.headers().get("x-request-id").unwrap(),
        "req-42"
    );

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(
        json,
        serde_json::json!({"code": 500, "message": "server unknown error"})
    );
}

#[tokio::test]
async fn panic_response_gets_generated_request_id() {
    let response = panicking_app()
        .oneshot(Request::builder().uri("/boom").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let id = response.headers().get("x-request-id").unwrap();
    assert!(!id.is_empty());
}
