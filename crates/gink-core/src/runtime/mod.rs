//! Post-generation tool management
//!
//! Runs tools like `gofmt` inside a freshly generated project.

pub mod tool;

pub use tool::{ToolConfig, ToolManager};
