use std::fmt;

/// Stable outcome tag for a process tool invocation — doubles as the audit
/// `event` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolErrorKind {
    Timeout,
    NonZeroExit,
    SpawnFailure,
}

impl ToolErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolErrorKind::Timeout => "Timeout",
            ToolErrorKind::NonZeroExit => "NonZeroExit",
            ToolErrorKind::SpawnFailure => "SpawnFailure",
        }
    }
}

impl fmt::Display for ToolErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct ToolError {
    pub kind: ToolErrorKind,
    pub message: String,
}

impl ToolError {
    pub fn timeout() -> Self {
        Self {
            kind: ToolErrorKind::Timeout,
            message: "tool timed out".to_string(),
        }
    }

    pub fn non_zero_exit(stderr: &[u8], code: Option<i32>) -> Self {
        let trimmed = String::from_utf8_lossy(stderr).trim().to_string();
        let message = if trimmed.is_empty() {
            match code {
                Some(c) => format!("tool exited with non-zero status {c}"),
                None => "tool exited with non-zero status".to_string(),
            }
        } else {
            trimmed
        };
        Self {
            kind: ToolErrorKind::NonZeroExit,
            message,
        }
    }

    pub fn spawn_failure(message: impl Into<String>) -> Self {
        Self {
            kind: ToolErrorKind::SpawnFailure,
            message: message.into(),
        }
    }

    /// Converts to the shared domain error, attaching the tool name that the
    /// runner itself doesn't otherwise carry.
    pub fn into_domain_error(self, tool_name: &str) -> tl_domain::Error {
        tl_domain::Error::Tool {
            name: tool_name.to_string(),
            message: self.message,
        }
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ToolError {}
