//! Performance degradation sweep.
//!
//! Measures tool-selection accuracy for every model in `TEST_MODELS` at every
//! tool count in `TOOL_COUNTS`, writing one result file per model after each
//! cell, then a summary chart and analysis. Ctrl+C stops the sweep and still
//! writes everything gathered so far.
//!
//! Usage: `degradation` (all settings from the environment, see `Config`).

use anyhow::Context;
use std::sync::Arc;
use toolsift::{
    catalog::retail_catalog,
    embedding,
    harness::{self, DegradationHarness, ResultStore, SweepConfig, SweepResults},
    llm::{ChatModel, LlmError, OpenAiChatModel},
    telemetry, Config, RouterSettings,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing("toolsift=info");

    let config = Config::from_env()?;
    let api_key = config
        .openai_api_key
        .clone()
        .context("Set OPENAI_API_KEY in your environment")?;

    let catalog = retail_catalog()?;
    let goldens = harness::load_goldens(&config.golden_path)
        .with_context(|| format!("loading {}", config.golden_path.display()))?;
    let embedder = embedding::from_config(&config)?;

    tracing::info!(
        models = ?config.test_models,
        tool_counts = ?config.tool_counts,
        embed_model = embedder.model_id(),
        top_k = config.top_k,
        num_runs = config.num_runs,
        cases = goldens.len(),
        "Testing performance degradation"
    );

    let base_url = config.openai_base_url.clone();
    let provider = move |model: &str| -> Result<Arc<dyn ChatModel>, LlmError> {
        Ok(Arc::new(OpenAiChatModel::new(&api_key, &base_url, model)?))
    };

    let store = ResultStore::new(&config.results_dir);
    let sweep = DegradationHarness::new(
        catalog,
        goldens,
        embedder,
        Arc::new(provider),
        store.clone(),
        SweepConfig {
            models: config.test_models.clone(),
            tool_counts: config.tool_counts.clone(),
            num_runs: config.num_runs,
            router: RouterSettings::from_config(&config),
            resume: config.resume,
        },
    )
    .with_progress_bar();

    let mut results = SweepResults::default();
    let outcome = tokio::select! {
        outcome = sweep.run(&mut results) => Some(outcome),
        _ = tokio::signal::ctrl_c() => None,
    };

    match &outcome {
        Some(Ok(())) => tracing::info!("Testing complete, generating final results"),
        Some(Err(e)) => tracing::error!(error = %e, "Sweep failed, saving partial results"),
        None => tracing::warn!("Interrupted, saving partial results"),
    }

    if let Err(e) = store.save_all(&results) {
        tracing::error!(error = %e, "Failed to save results");
    }
    if let Err(e) = harness::write_chart(&config.chart_path, &results) {
        tracing::error!(error = %e, "Failed to write chart");
    }

    match outcome {
        Some(Err(e)) => Err(e.into()),
        _ => {
            harness::log_analysis(&results, config.accuracy_threshold);
            Ok(())
        }
    }
}
