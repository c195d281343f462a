pub mod buffer;
pub mod error;
pub mod runner;

pub use error::{ToolError, ToolErrorKind};
pub use runner::{run, DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_TIMEOUT_SECONDS};
