//! Provider-agnostic request/response shapes and the [`LlmProvider`] seam.
//! Only the OpenAI-compatible wire format is implemented on the other side
//! of this trait — no provider registry, no router, no streaming — but the
//! trait itself lets tests substitute a double.

use tl_domain::{Message, Result, ToolDefinition};

/// How sampling fields are attached to the outgoing request.
#[derive(Debug, Clone, Default)]
pub enum Sampling {
    /// Inject no sampling field at all.
    #[default]
    Unset,
    /// The caller explicitly asked for "the defaults" — serialized as
    /// `temperature: 1` and nothing else.
    Default,
    /// The caller set an explicit temperature.
    Temperature(f64),
}

#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub model: String,
    pub tools: Vec<ToolDefinition>,
    pub sampling: Sampling,
    /// The step number this call belongs to, used only to label debug dumps.
    pub step: u32,
}

impl ChatOptions {
    pub fn new(model: impl Into<String>, step: u32) -> Self {
        Self {
            model: model.into(),
            tools: Vec::new(),
            sampling: Sampling::Unset,
            step,
        }
    }
}

/// A side channel for request/response dumps in debug mode — never
/// stdout, since stdout carries only the final answer.
pub trait DebugSink: Send + Sync {
    fn write(&self, line: &str);
}

/// The default debug sink: stderr, one write per dump.
pub struct StderrDebugSink;

impl DebugSink for StderrDebugSink {
    fn write(&self, line: &str) {
        eprintln!("{line}");
    }
}

#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Sends `transcript` to the model and returns its reply as an
    /// assistant [`Message`]. `debug` receives the request/response dumps
    /// when the caller wants them; `None` suppresses dumping entirely.
    async fn complete(
        &self,
        transcript: &[Message],
        options: &ChatOptions,
        debug: Option<&dyn DebugSink>,
    ) -> Result<Message>;
}
