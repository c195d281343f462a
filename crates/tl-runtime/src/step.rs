//! The step loop / scheduler: drives the transcript and chat client in
//! alternation, dispatching tool calls to the process runner or the
//! in-process sandboxes, until the model produces a final answer or the
//! step budget is exhausted.

use std::time::Duration;

use tl_audit::AuditLogger;
use tl_domain::{Error, Message, Result};
use tl_providers::{ChatOptions, DebugSink, LlmProvider, Sampling};
use tl_sandbox::{ScriptOutcome, SandboxDefaults, WasmOutcome};
use tl_transcript::Transcript;

use crate::cancel::CancelToken;
use crate::registry::ToolRegistry;

/// Tool name reserved for the in-process script sandbox.
pub const SANDBOX_JS_TOOL: &str = "code.sandbox.js.run";
/// Tool name reserved for the in-process WASM sandbox.
pub const SANDBOX_WASM_TOOL: &str = "code.sandbox.wasm.run";

pub struct StepLoopConfig {
    pub model: String,
    pub max_steps: u32,
    pub default_tool_timeout: Duration,
    pub max_output_bytes: usize,
    pub sampling: Sampling,
    /// Fallback `wall_ms`/`output_kb` applied by the script sandbox when a
    /// request's own `limits` are absent or `<= 0` — sourced from
    /// `SandboxConfig` rather than the executor's hardcoded defaults.
    pub sandbox_defaults: SandboxDefaults,
}

impl Default for StepLoopConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_steps: 25,
            default_tool_timeout: Duration::from_secs(30),
            max_output_bytes: tl_tools::DEFAULT_MAX_OUTPUT_BYTES,
            sampling: Sampling::Unset,
            sandbox_defaults: SandboxDefaults::default(),
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum StepOutcome {
    /// The model produced a final answer with no outstanding tool calls.
    Completed { content: String },
    /// The loop terminated without a final answer: an HTTP failure, the
    /// step budget ran out, or the caller cancelled the run.
    Failed { message: String },
}

/// Runs the loop to completion, returning the transcript as it stood at
/// exit alongside the [`StepOutcome`]. The transcript is always
/// well-formed on return — even on cancellation, partially produced
/// tool-role replies are appended before the loop exits.
pub async fn run(
    provider: &dyn LlmProvider,
    registry: &ToolRegistry,
    audit: &AuditLogger,
    mut transcript: Transcript,
    cancel: &CancelToken,
    config: &StepLoopConfig,
    debug: Option<&dyn DebugSink>,
) -> (Transcript, StepOutcome) {
    let mut last_assistant_content = String::new();

    for step in 1..=config.max_steps {
        if cancel.is_cancelled() {
            return (transcript, StepOutcome::Failed { message: "run was cancelled".to_string() });
        }

        let snapshot = transcript.snapshot();
        let mut options = ChatOptions::new(config.model.clone(), step);
        options.tools = registry.definitions().to_vec();
        options.sampling = config.sampling.clone();

        let chat_result = tokio::select! {
            res = provider.complete(&snapshot, &options, debug) => res,
            _ = cancel.cancelled() => Err(Error::Other("chat call cancelled".to_string())),
        };

        let assistant = match chat_result {
            Ok(message) => message,
            Err(e) => {
                let message = format!("chat request failed: {e}");
                let _ = transcript.append(Message::assistant(message.clone(), vec![]));
                return (transcript, StepOutcome::Failed { message });
            }
        };

        last_assistant_content = assistant.content.clone();
        let tool_calls = assistant.tool_calls.clone().unwrap_or_default();

        if let Err(e) = transcript.append(assistant) {
            let message = format!("internal transcript error: {e}");
            return (transcript, StepOutcome::Failed { message });
        }

        if tool_calls.is_empty() {
            return (transcript, StepOutcome::Completed { content: last_assistant_content });
        }

        if cancel.is_cancelled() {
            for call in &tool_calls {
                let _ = transcript.append(Message::tool_result(
                    &call.id,
                    &call.function.name,
                    "{\"error\":\"cancelled before dispatch\"}",
                ));
            }
            return (transcript, StepOutcome::Failed { message: "run was cancelled".to_string() });
        }

        let futures: Vec<_> = tool_calls
            .iter()
            .map(|call| dispatch_one(audit, registry, config, call))
            .collect();
        let results = futures_util::future::join_all(futures).await;

        for (call, content) in tool_calls.iter().zip(results) {
            if let Err(e) = transcript.append(Message::tool_result(&call.id, &call.function.name, content)) {
                let message = format!("internal transcript error: {e}");
                return (transcript, StepOutcome::Failed { message });
            }
        }
    }

    (
        transcript,
        StepOutcome::Failed {
            message: format!(
                "step budget exhausted after {} steps; last assistant content: {last_assistant_content}",
                config.max_steps
            ),
        },
    )
}

async fn dispatch_one(
    audit: &AuditLogger,
    registry: &ToolRegistry,
    config: &StepLoopConfig,
    call: &tl_domain::ToolCall,
) -> String {
    let span = tracing::info_span!("tool.call", tool_name = %call.function.name);
    let _guard = span.enter();

    match call.function.name.as_str() {
        SANDBOX_JS_TOOL => {
            let outcome =
                tl_sandbox::run_script(audit, call.function.arguments.as_bytes(), config.sandbox_defaults).await;
            script_outcome_to_content(outcome)
        }
        SANDBOX_WASM_TOOL => {
            let outcome = tl_sandbox::run_wasm(audit, call.function.arguments.as_bytes()).await;
            wasm_outcome_to_content(outcome)
        }
        name => match registry.get(name) {
            None => serde_json::json!({"error": format!("unknown tool: {name}")}).to_string(),
            Some(spec) => match call.parsed_arguments() {
                Err(e) => serde_json::json!({"error": format!("invalid arguments: {e}")}).to_string(),
                Ok(value) => {
                    let canonical = serde_json::to_vec(&value).unwrap_or_default();
                    match tl_tools::run(audit, spec, &canonical, config.default_tool_timeout, config.max_output_bytes).await
                    {
                        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                        Err(e) => format!("{{\"error\":{}}}", serde_json::to_string(&e.message).unwrap_or_default()),
                    }
                }
            },
        },
    }
}

fn script_outcome_to_content(outcome: ScriptOutcome) -> String {
    match outcome.stdout {
        Some(stdout) => stdout.to_string(),
        None => outcome
            .stderr
            .map(|e| serde_json::to_string(&e).unwrap_or_default())
            .unwrap_or_else(|| "{\"error\":\"sandbox produced no output\"}".to_string()),
    }
}

fn wasm_outcome_to_content(outcome: WasmOutcome) -> String {
    match outcome.stdout {
        Some(stdout) => stdout.to_string(),
        None => outcome
            .stderr
            .map(|e| serde_json::to_string(&e).unwrap_or_default())
            .unwrap_or_else(|| "{\"error\":\"sandbox produced no output\"}".to_string()),
    }
}
