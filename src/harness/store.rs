//! Per-model result files.
//!
//! One CSV per model, rewritten in full after every completed cell so the file
//! on disk always holds exactly the cells finished so far, in order.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::{DegradationRecord, SweepResults};

const HEADER: &str = "num_tools,tool_accuracy,num_testable";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{path} line {line}: {reason}")]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

/// File-name-safe form of a model identifier: every character other than
/// ASCII alphanumerics and `-` becomes `-`.
pub fn safe_model_name(model: &str) -> String {
    model
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect()
}

/// Quote a CSV field when it contains a separator, quote or line break.
pub(crate) fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Replace `path` with `contents` via a sibling temp file and a rename.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("csv.tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(contents.as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)
}

#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, model: &str) -> PathBuf {
        self.dir
            .join(format!("performance_degradation_{}.csv", safe_model_name(model)))
    }

    /// Overwrite the model's file with `records`.
    pub fn save(&self, model: &str, records: &[DegradationRecord]) -> Result<PathBuf, StoreError> {
        let path = self.path_for(model);

        let mut out = String::with_capacity(HEADER.len() + 1 + records.len() * 24);
        out.push_str(HEADER);
        out.push('\n');
        for r in records {
            out.push_str(&format!("{},{},{}\n", r.num_tools, r.tool_accuracy, r.num_testable));
        }

        write_atomic(&path, &out).map_err(|source| StoreError::Write {
            path: path.clone(),
            source,
        })?;

        tracing::debug!(model, path = %path.display(), rows = records.len(), "Results saved");
        Ok(path)
    }

    /// Save every model that has at least one row.
    pub fn save_all(&self, results: &SweepResults) -> Result<(), StoreError> {
        for entry in results.models().iter().filter(|m| !m.records.is_empty()) {
            let path = self.save(&entry.model, &entry.records)?;
            tracing::info!(model = %entry.model, path = %path.display(), "Results saved");
        }
        Ok(())
    }

    /// Rows previously saved for `model`; empty when there is no file.
    pub fn load(&self, model: &str) -> Result<Vec<DegradationRecord>, StoreError> {
        let path = self.path_for(model);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::Read { path, source }),
        };

        let parse_err = |line: usize, reason: String| StoreError::Parse {
            path: path.clone(),
            line,
            reason,
        };

        let mut lines = text.lines().enumerate();
        match lines.next() {
            Some((_, header)) if header.trim() == HEADER => {}
            Some((_, header)) => return Err(parse_err(1, format!("unexpected header '{header}'"))),
            None => return Ok(Vec::new()),
        }

        let mut records = Vec::new();
        for (i, line) in lines.filter(|(_, l)| !l.trim().is_empty()) {
            let fields: Vec<&str> = line.split(',').map(str::trim).collect();
            let [num_tools, accuracy, testable] = fields.as_slice() else {
                return Err(parse_err(i + 1, format!("expected 3 fields, got {}", fields.len())));
            };
            records.push(DegradationRecord {
                num_tools: num_tools
                    .parse()
                    .map_err(|e| parse_err(i + 1, format!("num_tools: {e}")))?,
                tool_accuracy: accuracy
                    .parse()
                    .map_err(|e| parse_err(i + 1, format!("tool_accuracy: {e}")))?,
                num_testable: testable
                    .parse()
                    .map_err(|e| parse_err(i + 1, format!("num_testable: {e}")))?,
            });
        }

        Ok(records)
    }
}
