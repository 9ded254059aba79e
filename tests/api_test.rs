mod helpers;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use helpers::{gate_with, test_router, test_service, MockBackend, MockEmbedder, TEST_DIMS};
use memgate::backend::TextBackend;

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn add_body(text: &str, user: &str) -> Value {
    json!({
        "messages": [{"role": "user", "content": text}],
        "user_id": user,
    })
}

fn app_with_reply(reply: &str) -> Router {
    test_router(test_service(Some(gate_with(MockBackend::replying(reply))), None))
}

#[tokio::test]
async fn health_reports_components() {
    let app = app_with_reply("DECISION: USEFUL");
    let (status, body) = send(&app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["classifier"]["enabled"], true);
    assert_eq!(body["classifier"]["model"], "mock-model");
    assert_eq!(body["embedding"]["dimensions"], TEST_DIMS);
    assert_eq!(body["chat"]["enabled"], false);
    assert_eq!(body["stats"], json!({"stored": 0, "discarded": 0}));
}

#[tokio::test]
async fn useful_memory_is_stored_and_listed() {
    let app = app_with_reply("DECISION: USEFUL\nREASON: actionable reminder");

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/memories/",
        Some(add_body("Remind me to renew my passport before March", "alice")),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "stored");
    assert_eq!(body["deduplicated"], false);
    assert_eq!(body["content"], "Remind me to renew my passport before March");
    assert_eq!(body["user_id"], "alice");
    assert_eq!(body["metadata"]["classified"], true);
    assert_eq!(body["metadata"]["classifier_reason"], "actionable reminder");
    assert_eq!(body["stats"]["stored"], 1);

    let (status, list) = send(&app, Method::GET, "/v1/memories/?user_id=alice", None).await;
    assert_eq!(status, StatusCode::OK);
    let items = list.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], body["id"]);
}

#[tokio::test]
async fn discarded_memory_is_not_stored() {
    let app = app_with_reply("DECISION: DISCARD\nREASON: small talk");

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/memories",
        Some(add_body("hey there, how's it going?", "alice")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "discarded");
    assert_eq!(body["reason"], "small talk");
    assert!(body["id"].as_str().unwrap().starts_with("discarded_"));
    assert_eq!(body["stats"]["discarded"], 1);

    let (_, list) = send(&app, Method::GET, "/v1/memories?user_id=alice", None).await;
    assert!(list.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn classifier_outage_still_stores() {
    let app = test_router(test_service(Some(gate_with(MockBackend::failing())), None));

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/memories/",
        Some(add_body("flight lands at 6pm", "bob")),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["metadata"]["classifier_reason"], "classifier_error");
}

#[tokio::test]
async fn empty_capture_is_discarded() {
    let backend = MockBackend::replying("DECISION: USEFUL");
    let app = test_router(test_service(Some(gate_with(backend.clone())), None));

    let (status, body) = send(&app, Method::POST, "/v1/memories/", Some(add_body("", "alice"))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "discarded");
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn list_defaults_to_default_user_and_limit() {
    let app = test_router(test_service(None, None));
    for i in 0..12 {
        let body = json!({"messages": [{"role": "user", "content": format!("distinct note {i}")}]});
        let (status, _) = send(&app, Method::POST, "/v1/memories/", Some(body)).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, list) = send(&app, Method::GET, "/v1/memories/", None).await;
    let items = list.as_array().unwrap();
    assert_eq!(items.len(), 10);
    assert!(items.iter().all(|m| m["user_id"] == "default_user"));

    let (_, list) = send(&app, Method::GET, "/v1/memories/?limit=3", None).await;
    assert_eq!(list.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn search_returns_scored_results() {
    let app = test_router(test_service(None, None));
    for text in ["renew passport before March", "favourite tea is oolong"] {
        send(&app, Method::POST, "/v1/memories/", Some(add_body(text, "alice"))).await;
    }
    send(&app, Method::POST, "/v1/memories/", Some(add_body("renew passport", "bob"))).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/memories/search/",
        Some(json!({"query": "renew passport before March", "user_id": "alice", "limit": 5})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["memory"], "renew passport before March");
    assert!((results[0]["score"].as_f64().unwrap() - 1.0).abs() < 1e-4);
    assert!(results[0]["distance"].as_f64().unwrap() < 1e-3);
    assert!(results.iter().all(|r| r["user_id"] == "alice"));
}

#[tokio::test]
async fn oversized_search_limit_is_served() {
    let app = test_router(test_service(None, None));
    send(&app, Method::POST, "/v1/memories/", Some(add_body("renew passport", "alice"))).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/memories/search/",
        Some(json!({"query": "passport", "user_id": "alice", "limit": u64::MAX})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"].as_array().unwrap().len(), 1);

    let (status, list) = send(&app, Method::GET, "/v1/memories/?user_id=alice", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn search_requires_query() {
    let app = test_router(test_service(None, None));
    let (status, body) = send(&app, Method::POST, "/v1/memories/search", Some(json!({"query": "  "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("query"));
}

#[tokio::test]
async fn delete_by_id_then_not_found() {
    let app = test_router(test_service(None, None));
    let (_, created) = send(&app, Method::POST, "/v1/memories/", Some(add_body("gym at 7", "alice"))).await;
    let id = created["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, Method::DELETE, &format!("/v1/memories/{id}/"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"deleted": true, "id": id}));

    let (status, body) = send(&app, Method::DELETE, &format!("/v1/memories/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn get_by_id() {
    let app = test_router(test_service(None, None));
    let (_, created) = send(&app, Method::POST, "/v1/memories/", Some(add_body("wifi password is on the fridge", "alice"))).await;
    let id = created["id"].as_str().unwrap();

    let (status, body) = send(&app, Method::GET, &format!("/v1/memories/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["content"], "wifi password is on the fridge");

    let (status, _) = send(&app, Method::GET, "/v1/memories/nope/", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_all_for_user() {
    let app = test_router(test_service(None, None));
    send(&app, Method::POST, "/v1/memories/", Some(add_body("a one", "alice"))).await;
    send(&app, Method::POST, "/v1/memories/", Some(add_body("a two", "alice"))).await;
    send(&app, Method::POST, "/v1/memories/", Some(add_body("b one", "bob"))).await;

    let (status, body) = send(&app, Method::DELETE, "/v1/memories/?user_id=alice", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], 2);

    let (_, bob) = send(&app, Method::GET, "/v1/memories/?user_id=bob", None).await;
    assert_eq!(bob.as_array().unwrap().len(), 1);

    let (status, _) = send(&app, Method::DELETE, "/v1/memories/", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let app = test_router(test_service(None, None));
    let request = Request::builder()
        .method(Method::POST)
        .uri("/v1/memories/")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn non_object_metadata_is_rejected() {
    let app = test_router(test_service(None, None));
    let body = json!({
        "messages": [{"role": "user", "content": "keep this"}],
        "metadata": ["not", "an", "object"],
    });
    let (status, _) = send(&app, Method::POST, "/v1/memories/", Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn embeddings_accept_string_and_array() {
    let app = test_router(test_service(None, None));

    let (status, body) = send(&app, Method::POST, "/v1/embeddings", Some(json!({"input": "hello world"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["object"], "list");
    assert_eq!(body["model"], "mock-embedder");
    assert_eq!(body["data"][0]["object"], "embedding");
    assert_eq!(body["data"][0]["index"], 0);
    assert_eq!(body["data"][0]["embedding"].as_array().unwrap().len(), TEST_DIMS);

    let (_, body) = send(
        &app,
        Method::POST,
        "/v1/embeddings",
        Some(json!({"input": ["alpha", "beta"], "model": "ignored"})),
    )
    .await;
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[1]["index"], 1);
    let expected: Vec<f32> = MockEmbedder::vector("beta");
    let got: Vec<f32> = serde_json::from_value(data[1]["embedding"].clone()).unwrap();
    assert_eq!(got, expected);

    let (status, _) = send(&app, Method::POST, "/v1/embeddings", Some(json!({"input": []}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn embedding_failure_is_bad_gateway() {
    let service = memgate::service::MemoryService::new(
        helpers::test_db(),
        Arc::new(helpers::FailingEmbedder),
        None,
        None,
        helpers::test_settings(),
    );
    let app = test_router(service);

    let (status, body) = send(&app, Method::POST, "/v1/embeddings", Some(json!({"input": "x"}))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("embedding"));
}

#[tokio::test]
async fn chat_disabled_is_unavailable() {
    let app = test_router(test_service(None, None));
    let (status, _) = send(
        &app,
        Method::POST,
        "/v1/chat/completions",
        Some(json!({"messages": [{"role": "user", "content": "hi"}]})),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn chat_passthrough_wraps_completion() {
    let chat = MockBackend::replying("Hello! How can I help?");
    let app = test_router(test_service(None, Some(chat.clone() as Arc<dyn TextBackend>)));

    let (status, body) = send(
        &app,
        Method::POST,
        "/v1/chat/completions",
        Some(json!({"messages": [{"role": "user", "content": "hi"}], "max_tokens": 32})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["object"], "chat.completion");
    assert_eq!(body["choices"][0]["message"]["role"], "assistant");
    assert_eq!(body["choices"][0]["message"]["content"], "Hello! How can I help?");
    assert_eq!(body["choices"][0]["finish_reason"], "stop");
    assert_eq!(chat.calls(), 1);
}

#[tokio::test]
async fn chat_backend_failure_is_bad_gateway() {
    let app = test_router(test_service(None, Some(MockBackend::failing() as Arc<dyn TextBackend>)));
    let (status, _) = send(
        &app,
        Method::POST,
        "/v1/chat/completions",
        Some(json!({"messages": [{"role": "user", "content": "hi"}]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

async fn preflight(app: &Router, origin: &str) -> Option<String> {
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/v1/memories/")
        .header(header::ORIGIN, origin)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

#[tokio::test]
async fn cors_allows_whitelisted_origins_only() {
    let app = test_router(test_service(None, None));

    assert_eq!(
        preflight(&app, "chrome-extension://abcdef").await.as_deref(),
        Some("chrome-extension://abcdef")
    );
    assert_eq!(
        preflight(&app, "http://localhost:3000").await.as_deref(),
        Some("http://localhost:3000")
    );
    assert_eq!(preflight(&app, "http://evil.example").await, None);
}

#[tokio::test]
async fn requests_without_origin_are_served() {
    let app = test_router(test_service(None, None));
    let (status, _) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
}
