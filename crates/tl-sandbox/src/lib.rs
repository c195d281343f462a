pub mod error;
pub mod output;
pub mod request;
pub mod script;
pub mod wasm;

pub use error::{SandboxError, SandboxErrorCode};
pub use request::{
    RawLimits, SandboxDefaults, ScriptRequest, WasmRequest, DEFAULT_OUTPUT_KB, DEFAULT_WALL_MS,
};
pub use script::{run as run_script, ScriptOutcome};
pub use wasm::{checked_read, run as run_wasm, WasmOutcome};
