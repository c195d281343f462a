use std::fmt;

use serde::Serialize;

/// Stable taxonomy code shared by the script and WASM sandbox stderr
/// envelopes and reused as the audit `event` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxErrorCode {
    InvalidInput,
    Timeout,
    OutputLimit,
    EvalError,
    MissingImport,
    Unimplemented,
    OobMemory,
}

impl SandboxErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SandboxErrorCode::InvalidInput => "INVALID_INPUT",
            SandboxErrorCode::Timeout => "TIMEOUT",
            SandboxErrorCode::OutputLimit => "OUTPUT_LIMIT",
            SandboxErrorCode::EvalError => "EVAL_ERROR",
            SandboxErrorCode::MissingImport => "MISSING_IMPORT",
            SandboxErrorCode::Unimplemented => "UNIMPLEMENTED",
            SandboxErrorCode::OobMemory => "OOB_MEMORY",
        }
    }
}

impl fmt::Display for SandboxErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The `{code, message}` object written to stderr on any sandbox failure.
#[derive(Debug, Clone, Serialize)]
pub struct SandboxError {
    pub code: &'static str,
    pub message: String,
}

impl SandboxError {
    pub fn new(code: SandboxErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.as_str(),
            message: message.into(),
        }
    }
}

impl fmt::Display for SandboxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for SandboxError {}
