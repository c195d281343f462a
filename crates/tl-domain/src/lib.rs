pub mod config;
pub mod error;
pub mod tool;

pub use config::Config;
pub use error::{Error, Result};
pub use tool::{Message, Role, ToolCall, ToolCallFunction, ToolCallKind, ToolDefinition, ToolSpec};
