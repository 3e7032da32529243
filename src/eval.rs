//! Single-configuration evaluation: tool match and answer content per golden case.

use indicatif::ProgressBar;
use std::io;
use std::path::Path;

use crate::harness::golden::{contains_all, GoldenCase, Qid};
use crate::harness::store::{csv_field, write_atomic};
use crate::router::ToolRouter;

const HEADER: &str = "qid,expected_tool,picked_tool,tool_match,must_contain,answer_contains,ok";

#[derive(Debug, Clone, PartialEq)]
pub struct EvalRow {
    pub qid: Qid,
    pub expected_tool: String,
    pub picked_tool: Option<String>,
    pub tool_match: bool,
    pub must_contain: Vec<String>,
    pub answer_contains: bool,
    pub ok: bool,
}

impl EvalRow {
    fn to_csv(&self) -> String {
        [
            csv_field(&self.qid.to_string()),
            csv_field(&self.expected_tool),
            csv_field(self.picked_tool.as_deref().unwrap_or_default()),
            u8::from(self.tool_match).to_string(),
            csv_field(&self.must_contain.join(";")),
            u8::from(self.answer_contains).to_string(),
            u8::from(self.ok).to_string(),
        ]
        .join(",")
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalSummary {
    pub cases: usize,
    pub tool_accuracy: f64,
    pub must_contain_rate: f64,
}

/// Route every case in order. Failures become rows with `ok = false`.
pub async fn evaluate(router: &ToolRouter, cases: &[GoldenCase], progress: &ProgressBar) -> Vec<EvalRow> {
    let mut rows = Vec::with_capacity(cases.len());

    for case in cases {
        let (picked_tool, answer, ok) = match router.decide_and_execute(&case.query).await {
            Ok(decision) => (Some(decision.tool_name), decision.answer, true),
            Err(e) => {
                tracing::warn!(qid = %case.qid, kind = e.kind(), error = %e, "Case failed");
                (e.executed_tool().map(str::to_string), String::new(), false)
            }
        };

        rows.push(EvalRow {
            qid: case.qid.clone(),
            expected_tool: case.expected_tool.clone(),
            tool_match: picked_tool.as_deref() == Some(case.expected_tool.as_str()),
            picked_tool,
            must_contain: case.must_contain.clone(),
            answer_contains: contains_all(&answer, &case.must_contain),
            ok,
        });
        progress.inc(1);
    }

    rows
}

pub fn summarize(rows: &[EvalRow]) -> EvalSummary {
    let rate = |count: usize| {
        if rows.is_empty() {
            0.0
        } else {
            count as f64 / rows.len() as f64
        }
    };

    EvalSummary {
        cases: rows.len(),
        tool_accuracy: rate(rows.iter().filter(|r| r.tool_match).count()),
        must_contain_rate: rate(rows.iter().filter(|r| r.answer_contains).count()),
    }
}

pub fn write_rows(path: &Path, rows: &[EvalRow]) -> io::Result<()> {
    let mut out = String::from(HEADER);
    out.push('\n');
    for row in rows {
        out.push_str(&row.to_csv());
        out.push('\n');
    }
    write_atomic(path, &out)
}
