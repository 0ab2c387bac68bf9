//! Push endpoint behavior over HTTP.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::sync::Arc;
use tower::ServiceExt;

use invoice_writer::{router, serve};

use common::{Harness, message, push_body, tables};

fn push(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_valid_push_acknowledged() {
    let h = Harness::new();
    let app = router(Arc::new(h.processor.clone()));

    let response = app
        .oneshot(push(push_body(&message("INV-UE-200", 1))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(h.warehouse.headers(&tables().invoices).await.len(), 1);
}

#[tokio::test]
async fn test_garbage_push_still_acknowledged() {
    let h = Harness::new();
    let app = router(Arc::new(h.processor.clone()));

    let response = app.oneshot(push(b"\x00\xffnope".to_vec())).await.unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(h.quarantine.len().await, 1);
}

#[tokio::test]
async fn test_health() {
    let h = Harness::new();
    let app = router(Arc::new(h.processor.clone()));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_serve_stops_on_shutdown() {
    let h = Harness::new();
    let addr = "127.0.0.1:0".parse().unwrap();

    serve(addr, Arc::new(h.processor.clone()), async {})
        .await
        .unwrap();
}
