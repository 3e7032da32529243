//! Degradation harness: selection accuracy as the tool catalog grows.
//!
//! For every model and every tool count N (ascending), a router is built over
//! the first N catalog tools and run against the golden cases whose expected
//! tool is among them. Each finished cell is appended to the model's results
//! and the model's file is rewritten at once, so an interrupted sweep leaves
//! exactly the completed cells on disk.
//!
//! Everything runs strictly in sequence: one cell, one case, one model call at
//! a time.

pub mod analysis;
pub mod chart;
pub mod classify;
pub mod golden;
pub mod store;

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::catalog::Catalog;
use crate::embedding::Embedder;
use crate::llm::{ChatModel, LlmError};
use crate::router::{RouterSettings, ToolRouter};

pub use analysis::{log_analysis, summarize, summarize_all, ModelSummary};
pub use chart::{render_chart, write_chart};
pub use classify::{classify, FailureScope};
pub use golden::{contains_all, filter_testable, load_goldens, parse_goldens, GoldenCase, GoldenError, Qid};
pub use store::{safe_model_name, ResultStore, StoreError};

/// Accuracy of one (model, tool count) cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DegradationRecord {
    pub num_tools: usize,
    /// Mean of per-run accuracies, in `[0, 1]`.
    pub tool_accuracy: f64,
    pub num_testable: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellState {
    Pending,
    Running,
    Completed,
    /// Cell could not run for a reason unrelated to the model; recorded as 0.
    FailedSoft,
    /// Model unusable; the rest of its sweep is abandoned.
    FailedModel,
}

impl CellState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::FailedSoft => "failed_soft",
            Self::FailedModel => "failed_model",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellOutcome {
    Completed(DegradationRecord),
    FailedSoft(DegradationRecord),
    FailedModel(String),
}

impl CellOutcome {
    pub fn state(&self) -> CellState {
        match self {
            Self::Completed(_) => CellState::Completed,
            Self::FailedSoft(_) => CellState::FailedSoft,
            Self::FailedModel(_) => CellState::FailedModel,
        }
    }
}

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("failed to persist results: {0}")]
    Store(#[from] StoreError),
}

/// Hands out a chat model per identifier under test.
pub trait ModelProvider: Send + Sync {
    fn chat_model(&self, model_id: &str) -> Result<Arc<dyn ChatModel>, LlmError>;
}

impl<F> ModelProvider for F
where
    F: Fn(&str) -> Result<Arc<dyn ChatModel>, LlmError> + Send + Sync,
{
    fn chat_model(&self, model_id: &str) -> Result<Arc<dyn ChatModel>, LlmError> {
        self(model_id)
    }
}

#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub models: Vec<String>,
    /// Ascending tool counts.
    pub tool_counts: Vec<usize>,
    pub num_runs: usize,
    pub router: RouterSettings,
    /// Reuse cells already present in the result files.
    pub resume: bool,
}

/// Rows gathered for one model, in completion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelResults {
    pub model: String,
    pub records: Vec<DegradationRecord>,
    /// Why the sweep for this model was abandoned, if it was.
    pub failure: Option<String>,
}

impl ModelResults {
    pub fn has_cell(&self, num_tools: usize) -> bool {
        self.records.iter().any(|r| r.num_tools == num_tools)
    }
}

/// In-memory results of a sweep, in model order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepResults {
    models: Vec<ModelResults>,
}

impl SweepResults {
    pub fn models(&self) -> &[ModelResults] {
        &self.models
    }

    pub fn get(&self, model: &str) -> Option<&ModelResults> {
        self.models.iter().find(|m| m.model == model)
    }

    /// The entry for `model`, created empty on first use.
    pub fn model_mut(&mut self, model: &str) -> &mut ModelResults {
        let pos = match self.models.iter().position(|m| m.model == model) {
            Some(pos) => pos,
            None => {
                self.models.push(ModelResults {
                    model: model.to_string(),
                    ..ModelResults::default()
                });
                self.models.len() - 1
            }
        };
        &mut self.models[pos]
    }
}

pub struct DegradationHarness {
    catalog: Catalog,
    goldens: Vec<GoldenCase>,
    embedder: Arc<dyn Embedder>,
    models: Arc<dyn ModelProvider>,
    store: ResultStore,
    config: SweepConfig,
    progress: ProgressBar,
}

impl DegradationHarness {
    pub fn new(
        catalog: Catalog,
        goldens: Vec<GoldenCase>,
        embedder: Arc<dyn Embedder>,
        models: Arc<dyn ModelProvider>,
        store: ResultStore,
        config: SweepConfig,
    ) -> Self {
        Self {
            catalog,
            goldens,
            embedder,
            models,
            store,
            config,
            progress: ProgressBar::hidden(),
        }
    }

    /// Show an overall progress bar sized by [`total_case_runs`](Self::total_case_runs).
    pub fn with_progress_bar(mut self) -> Self {
        let bar = ProgressBar::new(self.total_case_runs());
        let style = ProgressStyle::with_template(
            "{msg:>24} [{elapsed_precise}] {wide_bar} {pos}/{len} ({eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style);
        bar.set_message("Overall progress");
        self.progress = bar;
        self
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    fn runnable(&self, num_tools: usize) -> bool {
        num_tools > 0 && num_tools <= self.catalog.len()
    }

    fn testable_count(&self, num_tools: usize) -> usize {
        match self.catalog.prefix(num_tools) {
            Ok(subset) => filter_testable(&self.goldens, &subset).len(),
            Err(_) => 0,
        }
    }

    /// Number of case evaluations a full sweep performs.
    pub fn total_case_runs(&self) -> u64 {
        let per_model: usize = self
            .config
            .tool_counts
            .iter()
            .filter(|&&n| self.runnable(n))
            .map(|&n| self.testable_count(n) * self.config.num_runs)
            .sum();
        (per_model * self.config.models.len()) as u64
    }

    /// Sweep every model. Results land in `results` as they complete, so the
    /// caller keeps them even if this future is dropped mid-sweep.
    pub async fn run(&self, results: &mut SweepResults) -> Result<(), HarnessError> {
        for (i, model) in self.config.models.iter().enumerate() {
            tracing::info!(
                model = %model,
                position = i + 1,
                total = self.config.models.len(),
                "Testing model"
            );
            self.run_model(model, results).await?;
        }
        self.progress.finish_and_clear();
        Ok(())
    }

    /// Sweep all tool counts for one model. Model-fatal failures end the
    /// model's sweep and are recorded; only persistence errors propagate.
    pub async fn run_model(&self, model: &str, results: &mut SweepResults) -> Result<(), HarnessError> {
        let entry = results.model_mut(model);
        if self.config.resume && entry.records.is_empty() {
            entry.records = self.store.load(model)?;
            if !entry.records.is_empty() {
                tracing::info!(model, cells = entry.records.len(), "Resuming from saved results");
            }
        }

        let chat = match self.models.chat_model(model) {
            Ok(chat) => chat,
            Err(e) => {
                tracing::error!(model, error = %e, "Model unavailable, skipping");
                entry.failure = Some(e.to_string());
                return Ok(());
            }
        };

        for &num_tools in &self.config.tool_counts {
            if !self.runnable(num_tools) {
                tracing::info!(
                    num_tools,
                    available = self.catalog.len(),
                    "Skipping tool count, not enough tools"
                );
                continue;
            }
            self.transition(model, num_tools, CellState::Pending);

            if entry.has_cell(num_tools) {
                let done = (self.testable_count(num_tools) * self.config.num_runs) as u64;
                self.progress.inc(done);
                tracing::info!(model, num_tools, "Cell already recorded, skipping");
                continue;
            }

            let outcome = self.run_cell(model, &chat, num_tools).await;
            self.transition(model, num_tools, outcome.state());

            match outcome {
                CellOutcome::Completed(record) | CellOutcome::FailedSoft(record) => {
                    tracing::info!(
                        model,
                        num_tools,
                        tool_accuracy = record.tool_accuracy,
                        num_testable = record.num_testable,
                        "Cell recorded"
                    );
                    entry.records.push(record);
                    self.store.save(model, &entry.records)?;
                }
                CellOutcome::FailedModel(reason) => {
                    tracing::error!(
                        model,
                        num_tools,
                        error = %reason,
                        "Model appears to be invalid or unavailable, skipping remaining tool counts"
                    );
                    entry.failure = Some(reason);
                    break;
                }
            }
        }

        Ok(())
    }

    fn transition(&self, model: &str, num_tools: usize, state: CellState) {
        tracing::debug!(model, num_tools, state = state.as_str(), "Cell state");
        if matches!(
            state,
            CellState::Completed | CellState::FailedSoft | CellState::FailedModel
        ) {
            metrics::counter!("harness_cells_total", "state" => state.as_str()).increment(1);
        }
    }

    fn cell_settings(&self, num_tools: usize) -> RouterSettings {
        let mut settings = self.config.router.clone();
        settings.embeddings_cache = settings
            .embeddings_cache
            .as_deref()
            .map(|path| cache_path_for(path, num_tools));
        settings
    }

    /// Evaluate one cell: first `num_tools` tools, filtered golden cases,
    /// `num_runs` passes averaged.
    pub async fn run_cell(&self, model: &str, chat: &Arc<dyn ChatModel>, num_tools: usize) -> CellOutcome {
        self.transition(model, num_tools, CellState::Running);

        let subset = match self.catalog.prefix(num_tools) {
            Ok(subset) => subset,
            Err(e) => {
                tracing::warn!(model, num_tools, error = %e, "Cell failed, recording zero accuracy");
                return CellOutcome::FailedSoft(DegradationRecord {
                    num_tools,
                    tool_accuracy: 0.0,
                    num_testable: 0,
                });
            }
        };

        let cases = filter_testable(&self.goldens, &subset);
        if cases.is_empty() {
            return CellOutcome::Completed(DegradationRecord {
                num_tools,
                tool_accuracy: 0.0,
                num_testable: 0,
            });
        }

        let router = match ToolRouter::build(
            subset,
            Arc::clone(&self.embedder),
            Arc::clone(chat),
            self.cell_settings(num_tools),
        )
        .await
        {
            Ok(router) => router,
            Err(e) => {
                let reason = format!("failed to build router for model '{model}': {e}");
                if classify::classify_index_error(&e) == FailureScope::Model {
                    return CellOutcome::FailedModel(reason);
                }
                tracing::warn!(model, num_tools, error = %reason, "Cell failed, recording zero accuracy");
                return CellOutcome::FailedSoft(DegradationRecord {
                    num_tools,
                    tool_accuracy: 0.0,
                    num_testable: cases.len(),
                });
            }
        };

        let mut run_means = Vec::with_capacity(self.config.num_runs);
        for run in 0..self.config.num_runs {
            let mut hits = 0usize;

            for case in &cases {
                let (hit, outcome) = match router.decide_and_execute(&case.query).await {
                    Ok(decision) => {
                        let hit = decision.tool_name == case.expected_tool;
                        (hit, if hit { "match" } else { "miss" })
                    }
                    Err(e) => match classify(&e) {
                        FailureScope::Model => return CellOutcome::FailedModel(e.to_string()),
                        FailureScope::Case => {
                            tracing::warn!(qid = %case.qid, kind = e.kind(), error = %e, "Case failed");
                            (e.executed_tool() == Some(case.expected_tool.as_str()), "error")
                        }
                    },
                };

                metrics::counter!("harness_cases_total", "outcome" => outcome).increment(1);
                hits += usize::from(hit);
                self.progress.inc(1);
            }

            let mean = hits as f64 / cases.len() as f64;
            tracing::debug!(model, num_tools, run, accuracy = mean, "Run finished");
            run_means.push(mean);
        }

        CellOutcome::Completed(DegradationRecord {
            num_tools,
            tool_accuracy: run_means.iter().sum::<f64>() / run_means.len() as f64,
            num_testable: cases.len(),
        })
    }
}

/// Each tool count embeds a different catalog prefix, so each gets its own cache file.
fn cache_path_for(path: &Path, num_tools: usize) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "embeddings".to_string());
    let file_name = match path.extension() {
        Some(ext) => format!("{stem}-{num_tools}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{num_tools}"),
    };
    path.with_file_name(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_mut_keeps_insertion_order() {
        let mut results = SweepResults::default();
        results.model_mut("b");
        results.model_mut("a").failure = Some("boom".to_string());
        results.model_mut("b").records.push(DegradationRecord {
            num_tools: 5,
            tool_accuracy: 1.0,
            num_testable: 2,
        });

        let names: Vec<&str> = results.models().iter().map(|m| m.model.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert!(results.get("b").unwrap().has_cell(5));
        assert!(!results.get("a").unwrap().has_cell(5));
    }

    #[test]
    fn test_cache_path_per_tool_count() {
        assert_eq!(
            cache_path_for(Path::new("cache/emb.bin"), 10),
            PathBuf::from("cache/emb-10.bin")
        );
        assert_eq!(cache_path_for(Path::new("emb"), 5), PathBuf::from("emb-5"));
    }

    #[test]
    fn test_cell_states_have_stable_labels() {
        assert_eq!(CellOutcome::FailedModel("x".into()).state().as_str(), "failed_model");
        assert_eq!(CellState::FailedSoft.as_str(), "failed_soft");
    }
}
