//! HTTP API tests for the routing service, backed by deterministic fakes.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use common::*;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use toolsift::{
    config::EmbeddingBackend,
    handlers::{api_router, health_handler},
    AppState, Config, RouterSettings, ToolRouter,
};
use tower::ServiceExt;

async fn test_state(model: ScriptedModel) -> Arc<AppState> {
    test_state_with(Config::default(), model).await
}

async fn test_state_with(config: Config, model: ScriptedModel) -> Arc<AppState> {
    let router = ToolRouter::build(
        store_catalog(Arc::new(AtomicUsize::new(0))),
        Arc::new(BagOfWords::new(STORE_VOCAB)),
        Arc::new(model),
        RouterSettings {
            top_k: 2,
            ..RouterSettings::default()
        },
    )
    .await
    .unwrap();

    Arc::new(AppState::new(config, router))
}

/// Helper to make a JSON request to the router.
async fn json_request(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let req = match method {
        "GET" => Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
        "POST" => Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.unwrap_or(json!({})).to_string()))
            .unwrap(),
        _ => panic!("Unsupported method"),
    };

    let response = app.oneshot(req).await.unwrap();
    let status = response.status();

    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(json!({}));

    (status, body)
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_endpoint_returns_200() {
    use axum::routing::get;

    let app = Router::new().route("/health", get(health_handler));
    let (status, body) = json_request(app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_ready_reports_index_and_model() {
    let state = test_state(ScriptedModel::top_candidate("gpt-test")).await;
    let (status, body) = json_request(api_router(state), "GET", "/ready", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["num_tools"], 3);
    assert_eq!(body["model"], "gpt-test");
    assert_eq!(body["embedding_backend"], "openai");
}

#[tokio::test]
async fn test_ready_reports_configured_backend() {
    let config = Config {
        embedding_backend: EmbeddingBackend::Local,
        ..Config::default()
    };
    let state = test_state_with(config, ScriptedModel::top_candidate("gpt-test")).await;
    let (status, body) = json_request(api_router(state), "GET", "/ready", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["embedding_backend"], "local");
}

#[tokio::test]
async fn test_not_ready_rejects_queries() {
    let state = test_state(ScriptedModel::top_candidate("gpt-test")).await;
    state.ready.store(false, Ordering::SeqCst);

    let (status, body) = json_request(api_router(state.clone()), "GET", "/ready", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "not_ready");

    let (status, body) = json_request(
        api_router(state),
        "POST",
        "/route",
        Some(json!({"query": "units in stock"})),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], 503);
}

// ============================================================================
// Search
// ============================================================================

#[tokio::test]
async fn test_search_empty_query_returns_400() {
    let state = test_state(ScriptedModel::top_candidate("gpt-test")).await;
    let (status, body) = json_request(
        api_router(state),
        "POST",
        "/search",
        Some(json!({"query": "   "})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("empty"));
}

#[tokio::test]
async fn test_search_zero_top_k_returns_400() {
    let state = test_state(ScriptedModel::top_candidate("gpt-test")).await;
    let (status, _) = json_request(
        api_router(state),
        "POST",
        "/search",
        Some(json!({"query": "stock", "top_k": 0})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_search_returns_ranked_definitions() {
    let state = test_state(ScriptedModel::top_candidate("gpt-test")).await;
    let (status, body) = json_request(
        api_router(state),
        "POST",
        "/search",
        Some(json!({"query": "how many units in stock", "top_k": 3})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["name"], "InventoryLookup");
    assert_eq!(results[0]["schema"]["required"][0], "sku");

    let scores: Vec<f64> = results.iter().map(|r| r["score"].as_f64().unwrap()).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]), "{scores:?}");
}

#[tokio::test]
async fn test_search_default_top_k() {
    let state = test_state(ScriptedModel::top_candidate("gpt-test")).await;
    let (status, body) = json_request(
        api_router(state),
        "POST",
        "/search",
        Some(json!({"query": "store hours"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["results"].as_array().unwrap().len(), 2);
}

// ============================================================================
// Route
// ============================================================================

#[tokio::test]
async fn test_route_success() {
    let state = test_state(ScriptedModel::top_candidate("gpt-test")).await;
    let (status, body) = json_request(
        api_router(state),
        "POST",
        "/route",
        Some(json!({"query": "how many units in stock"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["tool_name"], "InventoryLookup");
    assert_eq!(body["tool_result"]["content"], "SKU 42: 12 units on hand.");
    assert!(body["answer"].as_str().unwrap().contains("12 units"));
    assert_eq!(body["candidates"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_route_unknown_tool_returns_422() {
    let model = ScriptedModel::new("gpt-test", |_| Ok(tool_call("Teleport", json!({}))));
    let state = test_state(model).await;
    let (status, body) = json_request(
        api_router(state),
        "POST",
        "/route",
        Some(json!({"query": "units in stock"})),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["ok"], false);
    assert_eq!(body["kind"], "unknown_tool");
    assert_eq!(body["tool_name"], "Teleport");
}

#[tokio::test]
async fn test_route_synthesis_failure_returns_partial_state() {
    let model = ScriptedModel::new("gpt-test", |request| match selection_tools(request) {
        Some(tools) => Ok(tool_call(&tools[0], json!({"sku": "42"}))),
        None => Err(api_error(503, None, "overloaded")),
    });
    let state = test_state(model).await;
    let (status, body) = json_request(
        api_router(state),
        "POST",
        "/route",
        Some(json!({"query": "units in stock"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["kind"], "synthesis_failed");
    assert_eq!(body["tool_name"], "InventoryLookup");
    assert_eq!(body["tool_args"]["sku"], "42");
    assert_eq!(body["tool_result"]["content"], "SKU 42: 12 units on hand.");
}

#[tokio::test]
async fn test_route_empty_query_returns_400() {
    let state = test_state(ScriptedModel::top_candidate("gpt-test")).await;
    let (status, _) = json_request(
        api_router(state),
        "POST",
        "/route",
        Some(json!({"query": ""})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}
