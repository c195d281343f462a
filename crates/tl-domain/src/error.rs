use thiserror::Error;

/// Shared error type for the turnloop crates.
///
/// Component-local error enums (`ToolError`, `SandboxError`) convert into
/// this at the crate boundary; the stable taxonomy string used in audit
/// `event`/sandbox `code` fields lives on those local enums, not here.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("http error: {0}")]
    Http(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("provider {provider} error: {message}")]
    Provider { provider: String, message: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("tool {name} error: {message}")]
    Tool { name: String, message: String },

    #[error("sandbox error [{code}]: {message}")]
    Sandbox { code: String, message: String },

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
