//! Gemini provider against a local stand-in for the generative-language API.

mod common;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chat_service::models::Turn;
use chat_service::services::providers::gemini::{GeminiConfig, GeminiConnector, API_KEY_HEADER};
use chat_service::services::providers::{ModelConnector, ProviderError};
use chat_service::services::SessionManager;
use chat_service::startup::build_router;
use chat_service::AppState;
use common::{chat_request, send};
use secrecy::Secret;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

const VALID_KEY: &str = "good-key";
const MODEL: &str = "gemma-3-1b-it";

#[derive(Clone, Default)]
struct FakeApi {
    requests: Arc<Mutex<Vec<Value>>>,
    reply: Arc<Mutex<Option<(StatusCode, Value)>>>,
}

/// The key must arrive in the header and never in the query string.
fn authorized(headers: &HeaderMap, params: &HashMap<String, String>) -> bool {
    let header = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
    header == Some(VALID_KEY) && !params.contains_key("key")
}

async fn get_model(
    Path(model): Path<String>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    if !authorized(&headers, &params) {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": {"message": "API key not valid"}})),
        );
    }
    if model != MODEL {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": {"message": format!("models/{model} is not found")}})),
        );
    }
    (StatusCode::OK, Json(json!({"name": format!("models/{model}")})))
}

async fn generate(
    State(api): State<FakeApi>,
    Path(_method): Path<String>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    if !authorized(&headers, &params) {
        return (StatusCode::FORBIDDEN, Json(json!({})));
    }

    let last = body["contents"]
        .as_array()
        .and_then(|c| c.last())
        .and_then(|c| c["parts"][0]["text"].as_str())
        .unwrap_or_default()
        .to_string();
    api.requests.lock().unwrap().push(body);

    if let Some((status, reply)) = api.reply.lock().unwrap().take() {
        return (status, Json(reply));
    }

    (
        StatusCode::OK,
        Json(json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": format!("echo: {last}")}]},
                "finishReason": "STOP"
            }]
        })),
    )
}

async fn spawn_fake_api() -> (String, FakeApi) {
    let api = FakeApi::default();
    // `{model}:generateContent` is a single path segment, so both share one route.
    let router = Router::new()
        .route("/v1beta/models/:model", get(get_model).post(generate))
        .with_state(api.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (format!("http://{}/v1beta", addr), api)
}

fn connector(base: &str) -> GeminiConnector {
    GeminiConnector::new(GeminiConfig {
        api_base: base.to_string(),
    })
    .unwrap()
}

fn key(value: &str) -> Secret<String> {
    Secret::new(value.to_string())
}

#[tokio::test]
async fn connect_rejects_bad_key() {
    let (base, _) = spawn_fake_api().await;

    let err = connector(&base)
        .connect(&key("bad-key"), MODEL)
        .await
        .err()
        .unwrap();

    match err {
        ProviderError::ApiError(msg) => assert!(msg.contains("400"), "{msg}"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn connect_rejects_unknown_model() {
    let (base, _) = spawn_fake_api().await;

    let err = connector(&base)
        .connect(&key(VALID_KEY), "no-such-model")
        .await
        .err()
        .unwrap();

    match err {
        ProviderError::ApiError(msg) => assert!(msg.contains("not found"), "{msg}"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn connect_rejects_empty_key_without_network() {
    let err = connector("http://127.0.0.1:9/v1beta")
        .connect(&key(""), MODEL)
        .await
        .err()
        .unwrap();

    assert!(matches!(err, ProviderError::NotConfigured(_)));
}

#[tokio::test]
async fn unreachable_api_is_network_error() {
    let err = connector("http://127.0.0.1:9/v1beta")
        .connect(&key(VALID_KEY), MODEL)
        .await
        .err()
        .unwrap();

    assert!(matches!(err, ProviderError::NetworkError(_)));
}

#[tokio::test]
async fn send_replays_transcript() {
    let (base, api) = spawn_fake_api().await;
    let connection = connector(&base)
        .connect(&key(VALID_KEY), &format!("models/{MODEL}"))
        .await
        .unwrap();

    let history = vec![Turn::user("Hi"), Turn::model("Hello!")];
    let reply = connection.send(&history, "How are you?").await.unwrap();
    assert_eq!(reply, "echo: How are you?");

    let requests = api.requests.lock().unwrap();
    let contents = requests[0]["contents"].as_array().unwrap();
    let roles: Vec<&str> = contents
        .iter()
        .map(|c| c["role"].as_str().unwrap())
        .collect();
    assert_eq!(roles, vec!["user", "model", "user"]);
}

#[tokio::test]
async fn send_maps_rate_limit() {
    let (base, api) = spawn_fake_api().await;
    let connection = connector(&base)
        .connect(&key(VALID_KEY), MODEL)
        .await
        .unwrap();

    *api.reply.lock().unwrap() = Some((StatusCode::TOO_MANY_REQUESTS, json!({})));
    let err = connection.send(&[], "Hi").await.unwrap_err();

    assert_eq!(err, ProviderError::RateLimited);
}

#[tokio::test]
async fn send_maps_safety_block() {
    let (base, api) = spawn_fake_api().await;
    let connection = connector(&base)
        .connect(&key(VALID_KEY), MODEL)
        .await
        .unwrap();

    *api.reply.lock().unwrap() = Some((
        StatusCode::OK,
        json!({"candidates": [{"content": {"parts": []}, "finishReason": "SAFETY"}]}),
    ));
    let err = connection.send(&[], "Hi").await.unwrap_err();

    assert_eq!(err, ProviderError::ContentFiltered);
}

/// Answers the model lookup once, then stops listening, so the next request
/// is refused.
async fn spawn_one_shot_api() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        drop(listener);

        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            let n = stream.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
        }

        let body = format!(r#"{{"name":"models/{MODEL}"}}"#);
        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        let _ = stream.shutdown().await;
    });

    format!("http://{}/v1beta", addr)
}

const SECRET_KEY: &str = "super-secret-key";

#[tokio::test]
async fn network_error_does_not_reveal_api_key() {
    let base = spawn_one_shot_api().await;
    let connection = connector(&base)
        .connect(&key(SECRET_KEY), MODEL)
        .await
        .unwrap();

    let err = connection.send(&[], "Hi").await.unwrap_err();

    assert!(matches!(err, ProviderError::NetworkError(_)), "{err:?}");
    assert!(!err.to_string().contains(SECRET_KEY), "{err}");
}

#[tokio::test]
async fn chat_failure_reply_does_not_reveal_api_key() {
    let base = spawn_one_shot_api().await;
    let session = Arc::new(SessionManager::new(MODEL, Arc::new(connector(&base))));
    session.initialize(Some(&key(SECRET_KEY))).await.unwrap();
    let router = build_router(AppState::new(session));

    let (status, body) = send(&router, chat_request(r#"{"message":"hi"}"#)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let reply = body["response"].as_str().unwrap();
    assert!(reply.starts_with("An error occurred:"), "{reply}");
    assert!(!reply.contains(SECRET_KEY), "{reply}");
}

#[tokio::test]
async fn unreachable_api_error_does_not_reveal_api_key() {
    let err = connector("http://127.0.0.1:9/v1beta")
        .connect(&key(SECRET_KEY), MODEL)
        .await
        .err()
        .unwrap();

    assert!(!err.to_string().contains(SECRET_KEY), "{err}");
}
