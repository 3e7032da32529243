//! End-of-sweep summary per model.

use super::{DegradationRecord, SweepResults};

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSummary {
    pub model: String,
    /// First tool count whose accuracy is below the threshold.
    pub first_below_threshold: Option<usize>,
    pub first_num_tools: usize,
    pub last_num_tools: usize,
    /// `(first - last) / first * 100`; `None` when the first accuracy is 0.
    pub degradation_pct: Option<f64>,
}

/// Summarise one model's rows. Needs at least two rows.
pub fn summarize(model: &str, records: &[DegradationRecord], threshold_pct: f64) -> Option<ModelSummary> {
    let [first, .., last] = records else {
        return None;
    };

    let first_below_threshold = records
        .iter()
        .find(|r| r.tool_accuracy * 100.0 < threshold_pct)
        .map(|r| r.num_tools);

    let initial = first.tool_accuracy * 100.0;
    let fin = last.tool_accuracy * 100.0;
    let degradation_pct = (initial > 0.0).then(|| (initial - fin) / initial * 100.0);

    Some(ModelSummary {
        model: model.to_string(),
        first_below_threshold,
        first_num_tools: first.num_tools,
        last_num_tools: last.num_tools,
        degradation_pct,
    })
}

pub fn summarize_all(results: &SweepResults, threshold_pct: f64) -> Vec<ModelSummary> {
    results
        .models()
        .iter()
        .filter_map(|m| summarize(&m.model, &m.records, threshold_pct))
        .collect()
}

pub fn log_analysis(results: &SweepResults, threshold_pct: f64) {
    tracing::info!("Performance analysis");

    for entry in results.models() {
        if let Some(reason) = &entry.failure {
            tracing::warn!(model = %entry.model, cells = entry.records.len(), %reason, "Model sweep aborted");
        }
    }

    for summary in summarize_all(results, threshold_pct) {
        match summary.first_below_threshold {
            Some(num_tools) => tracing::info!(
                model = %summary.model,
                threshold_pct,
                num_tools,
                "Tool selection accuracy drops below threshold"
            ),
            None => tracing::info!(
                model = %summary.model,
                threshold_pct,
                "Tool selection accuracy stays above threshold for all tested tool counts"
            ),
        }

        match summary.degradation_pct {
            Some(pct) => tracing::info!(
                model = %summary.model,
                from = summary.first_num_tools,
                to = summary.last_num_tools,
                degradation_pct = %format!("{pct:.1}"),
                "Accuracy degradation"
            ),
            None => tracing::info!(
                model = %summary.model,
                "Degradation undefined, accuracy at the smallest tool count is 0"
            ),
        }
    }
}
