//! Tool catalog: specifications, handlers and the built-in retail set.

pub mod retail;
pub mod types;

pub use retail::{retail_catalog, retail_tools};
pub use types::{Catalog, CatalogError, ToolError, ToolHandler, ToolSpec};
