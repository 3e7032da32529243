//! Labelled evaluation cases.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::catalog::Catalog;

/// Case identifier. Files in the wild use both numbers and strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Qid {
    Number(i64),
    Text(String),
}

impl fmt::Display for Qid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldenCase {
    pub qid: Qid,
    pub query: String,
    pub expected_tool: String,
    /// Substrings the final answer must contain, case-insensitively.
    #[serde(default)]
    pub must_contain: Vec<String>,
}

#[derive(Debug, Error)]
pub enum GoldenError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

pub fn load_goldens(path: &Path) -> Result<Vec<GoldenCase>, GoldenError> {
    let text = fs::read_to_string(path).map_err(|source| GoldenError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let cases = parse_goldens(&text)?;
    tracing::info!(path = %path.display(), cases = cases.len(), "Loaded golden cases");
    Ok(cases)
}

/// Parse newline-delimited JSON records. Blank lines are skipped.
pub fn parse_goldens(text: &str) -> Result<Vec<GoldenCase>, GoldenError> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line).map_err(|source| GoldenError::Parse { line: i + 1, source })
        })
        .collect()
}

/// Cases whose expected tool is offered by `catalog`, in their stored order.
///
/// A case whose correct tool is absent is excluded rather than scored as a miss.
pub fn filter_testable<'a>(cases: &'a [GoldenCase], catalog: &Catalog) -> Vec<&'a GoldenCase> {
    let names = catalog.names();
    cases
        .iter()
        .filter(|c| names.contains(c.expected_tool.as_str()))
        .collect()
}

/// Case-insensitive check that `text` contains every needle.
pub fn contains_all(text: &str, needles: &[String]) -> bool {
    let haystack = text.to_lowercase();
    needles.iter().all(|n| haystack.contains(&n.to_lowercase()))
}
