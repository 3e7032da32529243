//! Tool specification and catalog types.

use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Failure reported by a tool handler.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ToolError {
    #[error("missing argument '{0}'")]
    MissingArgument(String),

    #[error("execution failed: {0}")]
    Execution(String),
}

/// Handler invoked with the parsed argument object of a tool call.
pub type ToolHandler = Arc<dyn Fn(&Map<String, Value>) -> Result<Value, ToolError> + Send + Sync>;

/// A named, schema-described callable capability.
///
/// The name is the join key between retrieval, selection and execution, so it
/// must be unique within a [`Catalog`].
#[derive(Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the accepted argument object.
    pub schema: Value,
    handler: ToolHandler,
}

impl ToolSpec {
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: Value,
        handler: F,
    ) -> Self
    where
        F: Fn(&Map<String, Value>) -> Result<Value, ToolError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            handler: Arc::new(handler),
        }
    }

    /// Text embedded for semantic matching: `"<name>: <description>"`.
    pub fn embedding_text(&self) -> String {
        format!("{}: {}", self.name, self.description)
    }

    /// Run the handler synchronously.
    pub fn call(&self, args: &Map<String, Value>) -> Result<Value, ToolError> {
        (self.handler)(args)
    }
}

impl fmt::Debug for ToolSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolSpec")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog contains no tools")]
    Empty,

    #[error("duplicate tool name '{0}'")]
    DuplicateName(String),
}

/// Ordered, immutable set of tools with unique names.
#[derive(Debug, Clone)]
pub struct Catalog {
    tools: Vec<ToolSpec>,
}

impl Catalog {
    pub fn new(tools: Vec<ToolSpec>) -> Result<Self, CatalogError> {
        if tools.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut seen = HashSet::with_capacity(tools.len());
        for tool in &tools {
            if !seen.insert(tool.name.as_str()) {
                return Err(CatalogError::DuplicateName(tool.name.clone()));
            }
        }

        Ok(Self { tools })
    }

    /// The first `n` tools in catalog order (the whole catalog if `n` exceeds it).
    ///
    /// Prefix truncation keeps smaller catalogs a strict subset of larger ones,
    /// which is what makes tool-count sweeps comparable step to step.
    pub fn prefix(&self, n: usize) -> Result<Self, CatalogError> {
        let end = n.min(self.tools.len());
        Self::new(self.tools[..end].to_vec())
    }

    pub fn tools(&self) -> &[ToolSpec] {
        &self.tools
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolSpec> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> HashSet<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }
}
