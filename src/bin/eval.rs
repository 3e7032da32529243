//! Single-configuration evaluation over the golden set.
//!
//! Routes every golden case with `ROUTER_MODEL`, checks the picked tool and
//! the must-contain substrings of the answer, and writes `results.csv` into
//! `RESULTS_DIR`.

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use toolsift::{
    catalog::retail_catalog,
    embedding, eval,
    harness::load_goldens,
    llm::OpenAiChatModel,
    telemetry, Config, RouterSettings, ToolRouter,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing("toolsift=info");

    let config = Config::from_env()?;
    let api_key = config
        .openai_api_key
        .as_ref()
        .context("Set OPENAI_API_KEY in your environment")?;

    let goldens = load_goldens(&config.golden_path)
        .with_context(|| format!("loading {}", config.golden_path.display()))?;

    let model = OpenAiChatModel::new(api_key, &config.openai_base_url, &config.router_model)?;
    let router = ToolRouter::build(
        retail_catalog()?,
        embedding::from_config(&config)?,
        Arc::new(model),
        RouterSettings::from_config(&config),
    )
    .await?;

    let progress = ProgressBar::new(goldens.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("Evaluating [{elapsed_precise}] {wide_bar} {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    let rows = eval::evaluate(&router, &goldens, &progress).await;
    progress.finish_and_clear();

    let path = config.results_dir.join("results.csv");
    eval::write_rows(&path, &rows).with_context(|| format!("writing {}", path.display()))?;

    let summary = eval::summarize(&rows);
    tracing::info!(
        cases = summary.cases,
        tool_accuracy = %format!("{:.3}", summary.tool_accuracy),
        must_contain_rate = %format!("{:.3}", summary.must_contain_rate),
        path = %path.display(),
        "Evaluation complete"
    );

    Ok(())
}
