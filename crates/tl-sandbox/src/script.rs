//! Script sandbox executor.
//!
//! Evaluates untrusted JavaScript under a QuickJS VM (`rquickjs`) with no
//! ambient globals except `read_input`/`emit`. Wall-clock enforcement uses
//! `Runtime::set_interrupt_handler` as the language-level interrupt hook —
//! cooperative yields in untrusted script can't be relied on.
//!
//! State machine: Ready → Running → (Complete | LimitHit | Interrupted |
//! Failed) → Reported.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};

use rquickjs::function::Func;
use rquickjs::{Context, Runtime};

use tl_audit::{AuditEntry, AuditLogger};

use crate::error::{SandboxError, SandboxErrorCode};
use crate::output::CappedOutput;
use crate::request::{ScriptRequest, SandboxDefaults};

pub struct ScriptOutcome {
    pub stdout: Option<serde_json::Value>,
    pub stderr: Option<SandboxError>,
}

/// Runs a script sandbox request end to end: decode, execute under the
/// configured limits, classify the result, and append exactly one audit
/// entry. `defaults` supplies the `wall_ms`/`output_kb` fallback applied
/// when the request's own `limits` are absent or `<= 0` — callers thread
/// their configured sandbox defaults through here rather than this
/// executor hardcoding an unconfigurable one.
pub async fn run(audit: &AuditLogger, request_json: &[u8], defaults: SandboxDefaults) -> ScriptOutcome {
    let start = Instant::now();

    let req: ScriptRequest = match serde_json::from_slice(request_json) {
        Ok(r) => r,
        Err(e) => {
            record(audit, start, 0, SandboxErrorCode::InvalidInput.as_str());
            return ScriptOutcome {
                stdout: None,
                stderr: Some(SandboxError::new(SandboxErrorCode::InvalidInput, e.to_string())),
            };
        }
    };

    let wall_ms = req.effective_wall_ms(&defaults);
    let cap_bytes = (req.effective_output_kb(&defaults) as usize) * 1024;
    let source = req.source;
    let input = req.input;

    let exec = tokio::task::spawn_blocking(move || execute(&source, &input, wall_ms, cap_bytes)).await;

    let (stdout, stderr, bytes_out, event) = match exec {
        Ok(ExecResult::Completed(output)) => {
            let bytes = output.len();
            (
                Some(serde_json::json!({ "output": output })),
                None,
                bytes,
                "success",
            )
        }
        Ok(ExecResult::OutputLimit(output)) => {
            let bytes = output.len();
            let err = SandboxError::new(SandboxErrorCode::OutputLimit, "output byte cap reached");
            (
                Some(serde_json::json!({ "output": output })),
                Some(err),
                bytes,
                SandboxErrorCode::OutputLimit.as_str(),
            )
        }
        Ok(ExecResult::Timeout) => {
            let err = SandboxError::new(
                SandboxErrorCode::Timeout,
                format!("execution exceeded {wall_ms}ms"),
            );
            (None, Some(err), 0, SandboxErrorCode::Timeout.as_str())
        }
        Ok(ExecResult::Failed(message)) => {
            let err = SandboxError::new(SandboxErrorCode::EvalError, message);
            (None, Some(err), 0, SandboxErrorCode::EvalError.as_str())
        }
        Err(join_err) => {
            let err = SandboxError::new(
                SandboxErrorCode::EvalError,
                format!("sandbox worker did not complete cleanly: {join_err}"),
            );
            (None, Some(err), 0, SandboxErrorCode::EvalError.as_str())
        }
    };

    record(audit, start, bytes_out, event);
    ScriptOutcome { stdout, stderr }
}

fn record(audit: &AuditLogger, start: Instant, bytes_out: usize, event: &str) {
    let ms = start.elapsed().as_millis() as u64;
    let entry = AuditEntry::new("code.sandbox.js.run", "tools.js.run", ms, bytes_out, event);
    audit.append(&entry);
}

enum ExecResult {
    Completed(String),
    OutputLimit(String),
    Timeout,
    Failed(String),
}

/// Runs on a blocking worker thread (QuickJS is not `Send`): builds a fresh
/// VM bound to exactly `read_input`/`emit`, arms the wall-clock interrupt,
/// evaluates `source`, and classifies the outcome.
fn execute(source: &str, input: &str, wall_ms: u64, cap_bytes: usize) -> ExecResult {
    let deadline = Instant::now() + Duration::from_millis(wall_ms);
    let interrupted = Rc::new(Cell::new(false));
    let interrupted_for_handler = interrupted.clone();

    let runtime = match Runtime::new() {
        Ok(rt) => rt,
        Err(e) => return ExecResult::Failed(format!("failed to start VM: {e}")),
    };
    runtime.set_interrupt_handler(Some(Box::new(move || {
        if Instant::now() >= deadline {
            interrupted_for_handler.set(true);
            true
        } else {
            false
        }
    })));

    let context = match Context::full(&runtime) {
        Ok(ctx) => ctx,
        Err(e) => return ExecResult::Failed(format!("failed to create VM context: {e}")),
    };

    let output = Rc::new(RefCell::new(CappedOutput::new(cap_bytes)));
    let output_for_emit = output.clone();
    let input_owned = input.to_string();
    let source_owned = source.to_string();

    // read_input/emit are the ONLY globals bound. require, console,
    // setTimeout/setInterval, module loaders, and any other host I/O are
    // left unbound — scripts that reference them see `undefined`.
    let eval_result: Result<(), String> = context.with(|ctx| {
        let globals = ctx.globals();
        globals
            .set("read_input", Func::from(move || input_owned.clone()))
            .map_err(|e| format!("failed to bind read_input: {e}"))?;
        globals
            .set(
                "emit",
                Func::from(move |s: String| {
                    output_for_emit.borrow_mut().emit(&s);
                }),
            )
            .map_err(|e| format!("failed to bind emit: {e}"))?;

        ctx.eval::<(), _>(source_owned.as_bytes())
            .map_err(|e| e.to_string())
    });

    if interrupted.get() {
        return ExecResult::Timeout;
    }

    let limit_hit = output.borrow().limit_hit();
    let text = Rc::try_unwrap(output)
        .map(|cell| cell.into_inner().into_string())
        .unwrap_or_default();

    if limit_hit {
        return ExecResult::OutputLimit(text);
    }

    match eval_result {
        Ok(()) => ExecResult::Completed(text),
        Err(message) => ExecResult::Failed(message),
    }
}
