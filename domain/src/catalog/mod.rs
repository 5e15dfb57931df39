//! Tool catalog: the metadata every callable tool is described by.

pub mod collection;
pub mod entities;
pub mod validation;

pub use collection::ToolCatalog;
pub use entities::{ParamType, ToolDefinition, ToolKind, ToolParameter};
pub use validation::{ArgumentValidator, DefaultArgumentValidator};
