//! Retrieval, selection and execution against deterministic fakes.

mod common;

use common::*;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use toolsift::catalog::ToolError;
use toolsift::llm::{ChatMessage, ToolChoice};
use toolsift::{Catalog, RouteError, RouterSettings, ToolRouter, ToolSpec};

async fn store_router(model: Arc<ScriptedModel>, settings: RouterSettings) -> (ToolRouter, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let router = ToolRouter::build(
        store_catalog(calls.clone()),
        Arc::new(BagOfWords::new(STORE_VOCAB)),
        model,
        settings,
    )
    .await
    .unwrap();
    (router, calls)
}

fn top_k(k: usize) -> RouterSettings {
    RouterSettings {
        top_k: k,
        ..RouterSettings::default()
    }
}

#[tokio::test]
async fn test_best_match_is_executed_and_answered() {
    let model = Arc::new(ScriptedModel::top_candidate("scripted"));
    let (router, calls) = store_router(model.clone(), top_k(2)).await;

    let decision = router
        .decide_and_execute("How many units in stock for SKU 42?")
        .await
        .unwrap();

    assert_eq!(decision.tool_name, "InventoryLookup");
    assert_eq!(decision.candidates[0], "InventoryLookup");
    assert_eq!(decision.candidates.len(), 2);
    assert!(decision.tool_result["content"].as_str().unwrap().contains("12 units"));
    assert!(decision.answer.contains("12 units"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let requests = model.requests();
    assert_eq!(requests.len(), 2);

    // Selection offers exactly the top-K candidates and forces a call.
    assert_eq!(requests[0].tool_choice, Some(ToolChoice::Required));
    assert_eq!(requests[0].tools.len(), 2);

    // Synthesis replays the call and feeds back the tool output verbatim.
    assert!(requests[1].tools.is_empty());
    assert_eq!(requests[1].messages.len(), 4);
    let ChatMessage::Assistant { tool_calls, .. } = &requests[1].messages[2] else {
        panic!("expected the assistant turn to be replayed");
    };
    let ChatMessage::Tool { tool_call_id, name, content } = &requests[1].messages[3] else {
        panic!("expected a tool turn");
    };
    assert_eq!(tool_call_id, &tool_calls[0].id);
    assert_eq!(name, "InventoryLookup");
    assert!(content.contains("SKU 42: 12 units on hand."));
}

#[tokio::test]
async fn test_search_ranks_by_similarity() {
    let model = Arc::new(ScriptedModel::top_candidate("scripted"));
    let (router, _) = store_router(model, top_k(3)).await;

    let ranked = router.search("weather forecast", 3).await.unwrap();
    let names: Vec<&str> = ranked.iter().map(|s| s.tool.name.as_str()).collect();

    assert_eq!(names[0], "WeatherForecast");
    assert!(ranked[0].score > 0.99);
    for pair in ranked.windows(2) {
        assert!(pair[0].score >= pair[1].score, "scores not descending");
    }
}

#[tokio::test]
async fn test_zero_query_vector_scores_zero() {
    let model = Arc::new(ScriptedModel::top_candidate("scripted"));
    let (router, _) = store_router(model, top_k(3)).await;

    let ranked = router.search("xyzzy", 3).await.unwrap();

    assert!(ranked.iter().all(|s| s.score == 0.0));
    // Ties keep catalog order.
    let names: Vec<&str> = ranked.iter().map(|s| s.tool.name.as_str()).collect();
    assert_eq!(names, vec!["WeatherForecast", "InventoryLookup", "StoreHours"]);
}

#[tokio::test]
async fn test_search_clamps_k_to_catalog_size() {
    let model = Arc::new(ScriptedModel::top_candidate("scripted"));
    let (router, _) = store_router(model, top_k(3)).await;

    assert_eq!(router.search("stock", 50).await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_unknown_tool_is_not_executed() {
    let model = Arc::new(ScriptedModel::new("scripted", |_| {
        Ok(tool_call("DeleteEverything", json!({})))
    }));
    let (router, calls) = store_router(model.clone(), top_k(2)).await;

    let err = router.decide_and_execute("units in stock").await.unwrap_err();

    assert!(matches!(err, RouteError::UnknownTool { ref tool_name, .. } if tool_name == "DeleteEverything"));
    assert_eq!(err.kind(), "unknown_tool");
    assert_eq!(err.executed_tool(), None);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(model.calls(), 1, "no synthesis after a rejected pick");
}

#[tokio::test]
async fn test_pick_outside_candidates_is_rejected() {
    // StoreHours exists in the catalog but is not among the top-1 candidates.
    let model = Arc::new(ScriptedModel::new("scripted", |_| {
        Ok(tool_call("StoreHours", json!({"sku": "42"})))
    }));
    let (router, calls) = store_router(model, top_k(1)).await;

    let err = router.decide_and_execute("units in stock").await.unwrap_err();

    assert_eq!(err.kind(), "unknown_tool");
    assert_eq!(err.candidates(), ["InventoryLookup".to_string()]);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_no_tool_selected() {
    let model = Arc::new(ScriptedModel::new("scripted", |_| Ok(text("I cannot help with that."))));
    let (router, calls) = store_router(model, top_k(2)).await;

    let err = router.decide_and_execute("units in stock").await.unwrap_err();

    assert_eq!(err.kind(), "no_tool_selected");
    assert_eq!(err.candidates().len(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_malformed_arguments_are_rejected() {
    let model = Arc::new(ScriptedModel::new("scripted", |_| {
        Ok(raw_tool_call("InventoryLookup", "{sku: 42"))
    }));
    let (router, calls) = store_router(model, top_k(2)).await;

    let err = router.decide_and_execute("units in stock").await.unwrap_err();

    assert_eq!(err.kind(), "invalid_arguments");
    assert_eq!(err.chosen_tool(), Some("InventoryLookup"));
    assert_eq!(err.report()["raw_arguments"], "{sku: 42");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_schema_check_is_opt_in() {
    let script = |request: &toolsift::llm::ChatRequest| match selection_tools(request) {
        Some(_) => Ok(tool_call("InventoryLookup", json!({}))),
        None => Ok(text("done")),
    };

    let lenient = Arc::new(ScriptedModel::new("scripted", script));
    let (router, _) = store_router(lenient, top_k(2)).await;
    assert!(router.decide_and_execute("units in stock").await.is_ok());

    let strict = Arc::new(ScriptedModel::new("scripted", script));
    let settings = RouterSettings {
        validate_arguments: true,
        ..top_k(2)
    };
    let (router, calls) = store_router(strict, settings).await;
    let err = router.decide_and_execute("units in stock").await.unwrap_err();

    assert_eq!(err.kind(), "invalid_arguments");
    assert!(err.to_string().contains("sku"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_synthesis_failure_keeps_executed_tool() {
    let model = Arc::new(ScriptedModel::new("scripted", |request| match selection_tools(request) {
        Some(_) => Ok(tool_call("InventoryLookup", json!({"sku": "42"}))),
        None => Err(api_error(500, None, "upstream exploded")),
    }));
    let (router, calls) = store_router(model, top_k(2)).await;

    let err = router.decide_and_execute("units in stock").await.unwrap_err();

    let RouteError::SynthesisFailed {
        ref tool_name,
        ref tool_args,
        ref tool_result,
        ..
    } = err
    else {
        panic!("expected synthesis failure, got {err:?}");
    };
    assert_eq!(tool_name, "InventoryLookup");
    assert_eq!(tool_args["sku"], "42");
    assert_eq!(tool_result["content"], "SKU 42: 12 units on hand.");
    assert_eq!(err.executed_tool(), Some("InventoryLookup"));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failing_tool_stops_before_synthesis() {
    let catalog = Catalog::new(vec![ToolSpec::new(
        "InventoryLookup",
        "Check stock units on hand",
        json!({"type": "object", "properties": {"sku": {"type": "string"}}}),
        |_| Err(ToolError::Execution("warehouse offline".to_string())),
    )])
    .unwrap();
    let model = Arc::new(ScriptedModel::new("scripted", |request| match selection_tools(request) {
        Some(tools) => Ok(tool_call(&tools[0], json!({"sku": "42"}))),
        None => Ok(text("should not be asked")),
    }));
    let router = ToolRouter::build(
        catalog,
        Arc::new(BagOfWords::new(STORE_VOCAB)),
        model.clone(),
        top_k(1),
    )
    .await
    .unwrap();

    let err = router.decide_and_execute("units in stock").await.unwrap_err();

    assert!(matches!(err, RouteError::ToolFailed { ref tool_name, .. } if tool_name == "InventoryLookup"));
    assert_eq!(err.kind(), "tool_failed");
    assert_eq!(err.executed_tool(), None);
    assert_eq!(err.chosen_tool(), Some("InventoryLookup"));
    assert!(err.to_string().contains("warehouse offline"));

    let report = err.report();
    assert_eq!(report["ok"], false);
    assert_eq!(report["tool_name"], "InventoryLookup");
    assert_eq!(report["tool_args"]["sku"], "42");
    assert!(report.get("tool_result").is_none());

    assert_eq!(model.calls(), 1, "no synthesis after a failed tool");
}

#[tokio::test]
async fn test_selection_api_failure() {
    let model = Arc::new(ScriptedModel::new("scripted", |_| {
        Err(api_error(404, Some("model_not_found"), "The model does not exist"))
    }));
    let (router, calls) = store_router(model, top_k(2)).await;

    let err = router.decide_and_execute("units in stock").await.unwrap_err();

    assert_eq!(err.kind(), "api_call_failed");
    assert_eq!(err.llm_error().and_then(|e| e.status()), Some(404));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_embeddings_cache_is_reused() {
    let dir = tempfile::tempdir().unwrap();
    let settings = RouterSettings {
        embeddings_cache: Some(dir.path().join("emb.bin")),
        ..top_k(2)
    };
    let embedder = Arc::new(BagOfWords::new(STORE_VOCAB));
    let calls = Arc::new(AtomicUsize::new(0));

    for _ in 0..2 {
        let router = ToolRouter::build(
            store_catalog(calls.clone()),
            embedder.clone(),
            Arc::new(ScriptedModel::top_candidate("scripted")),
            settings.clone(),
        )
        .await
        .unwrap();
        assert_eq!(router.index().len(), 3);
    }

    assert_eq!(embedder.batches(), 1, "second build should hit the cache");
}

#[tokio::test]
async fn test_evaluate_scores_tool_and_answer() {
    let model = Arc::new(ScriptedModel::top_candidate("scripted"));
    let (router, _) = store_router(model, top_k(2)).await;
    let cases = toolsift::harness::parse_goldens(concat!(
        r#"{"qid": 1, "query": "units in stock", "expected_tool": "InventoryLookup", "must_contain": ["12 UNITS"]}"#,
        "\n",
        r#"{"qid": "q2", "query": "weather forecast", "expected_tool": "StoreHours", "must_contain": ["9pm"]}"#,
    ))
    .unwrap();

    let rows = toolsift::eval::evaluate(&router, &cases, &indicatif::ProgressBar::hidden()).await;

    assert!(rows[0].tool_match && rows[0].answer_contains && rows[0].ok);
    assert_eq!(rows[1].picked_tool.as_deref(), Some("WeatherForecast"));
    assert!(!rows[1].tool_match);
    assert!(!rows[1].answer_contains);

    let summary = toolsift::eval::summarize(&rows);
    assert_eq!(summary.cases, 2);
    assert_eq!(summary.tool_accuracy, 0.5);
    assert_eq!(summary.must_contain_rate, 0.5);
}
