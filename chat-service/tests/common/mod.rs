#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chat_service::services::providers::mock::{MockConnection, MockConnector};
use chat_service::services::SessionManager;
use chat_service::startup::build_router;
use chat_service::AppState;
use secrecy::Secret;
use std::sync::Arc;
use tower::util::ServiceExt;

pub const MODEL: &str = "gemma-3-1b-it";

pub struct TestApp {
    pub router: Router,
    pub session: Arc<SessionManager>,
    pub connector: Arc<MockConnector>,
    pub connection: Arc<MockConnection>,
}

/// Router over a mock-backed session; initialised when `ready` is true.
pub async fn spawn_router(ready: bool) -> TestApp {
    let connection = Arc::new(MockConnection::new());
    let connector = Arc::new(MockConnector::new(connection.clone()));
    let session = Arc::new(SessionManager::new(MODEL, connector.clone()));

    if ready {
        session
            .initialize(Some(&Secret::new("test-api-key".to_string())))
            .await
            .expect("mock session should initialize");
    }

    TestApp {
        router: build_router(AppState::new(session.clone())),
        session,
        connector,
        connection,
    }
}

pub async fn send(router: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).expect("response should be JSON");
    (status, body)
}

pub fn chat_request(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/chat")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

pub fn health_request() -> Request<Body> {
    Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap()
}
