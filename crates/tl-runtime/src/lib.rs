pub mod cancel;
pub mod registry;
pub mod step;

pub use cancel::CancelToken;
pub use registry::ToolRegistry;
pub use step::{run, StepLoopConfig, StepOutcome, SANDBOX_JS_TOOL, SANDBOX_WASM_TOOL};
