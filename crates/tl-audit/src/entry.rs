use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// One NDJSON record describing a single tool or sandbox invocation.
/// `event` is one of the stable taxonomy strings (`success`, `TIMEOUT`,
/// `OUTPUT_LIMIT`, `EVAL_ERROR`, `INVALID_INPUT`, `MISSING_IMPORT`,
/// `UNIMPLEMENTED`, or a process-runner outcome such as
/// `NonZeroExit`/`SpawnFailure`).
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub ts: String,
    pub tool: String,
    pub span: String,
    pub ms: u64,
    pub bytes_out: usize,
    pub event: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AuditEntry {
    pub fn new(
        tool: impl Into<String>,
        span: impl Into<String>,
        ms: u64,
        bytes_out: usize,
        event: impl Into<String>,
    ) -> Self {
        Self {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true),
            tool: tool.into(),
            span: span.into(),
            ms,
            bytes_out,
            event: event.into(),
            extra: Map::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}
