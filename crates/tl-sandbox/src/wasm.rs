//! WASM sandbox executor.
//!
//! Shares the script sandbox's request/response envelope but validates a
//! base64-encoded module instead of evaluating a script. Execution itself
//! is future work (`UNIMPLEMENTED`); what's fixed here is the validation
//! order, the WASI refusal, and the guest-memory bounds-check helper,
//! independent of whether a module ever actually runs.

use std::time::Instant;

use base64::Engine as _;

use tl_audit::{AuditEntry, AuditLogger};

use crate::error::{SandboxError, SandboxErrorCode};
use crate::request::WasmRequest;

/// A module that imports this WASI function is refused outright — the
/// sandbox has no host imports configured for it.
const WASI_MARKER: &[u8] = b"wasi_snapshot_preview1";

pub struct WasmOutcome {
    pub stdout: Option<serde_json::Value>,
    pub stderr: Option<SandboxError>,
}

pub async fn run(audit: &AuditLogger, request_json: &[u8]) -> WasmOutcome {
    let start = Instant::now();
    let outcome = validate_and_dispatch(request_json);
    let event = outcome
        .stderr
        .as_ref()
        .map(|e| e.code)
        .unwrap_or(SandboxErrorCode::Unimplemented.as_str());
    record(audit, start, 0, event);
    outcome
}

/// Validation order is significant: the first failure wins.
fn validate_and_dispatch(request_json: &[u8]) -> WasmOutcome {
    let req: WasmRequest = match serde_json::from_slice(request_json) {
        Ok(r) => r,
        Err(e) => return invalid(e.to_string()),
    };

    if req.module_b64.is_empty() {
        return invalid("module_b64 is required");
    }

    let module_bytes = match base64::engine::general_purpose::STANDARD.decode(&req.module_b64) {
        Ok(bytes) => bytes,
        Err(e) => return invalid(format!("module_b64 is not valid standard base64: {e}")),
    };

    // Unlike the script sandbox, the WASM envelope has no safe silent
    // default for these three — a guest needs a real wall/output/memory
    // budget, so an absent or non-positive value is a caller error.
    if !matches!(req.limits.output_kb, Some(n) if n > 0) {
        return invalid("limits.output_kb must be > 0");
    }
    if !matches!(req.limits.wall_ms, Some(n) if n > 0) {
        return invalid("limits.wall_ms must be > 0");
    }
    if !matches!(req.limits.mem_pages, Some(n) if n > 0) {
        return invalid("limits.mem_pages must be > 0");
    }

    if contains_subsequence(&module_bytes, WASI_MARKER) {
        return WasmOutcome {
            stdout: None,
            stderr: Some(SandboxError::new(
                SandboxErrorCode::MissingImport,
                "module references wasi_snapshot_preview1, which is not bound",
            )),
        };
    }

    WasmOutcome {
        stdout: None,
        stderr: Some(SandboxError::new(
            SandboxErrorCode::Unimplemented,
            "WASM execution is not implemented",
        )),
    }
}

fn invalid(message: impl Into<String>) -> WasmOutcome {
    WasmOutcome {
        stdout: None,
        stderr: Some(SandboxError::new(SandboxErrorCode::InvalidInput, message)),
    }
}

fn contains_subsequence(haystack: &[u8], needle: &[u8]) -> bool {
    needle.len() <= haystack.len() && haystack.windows(needle.len()).any(|w| w == needle)
}

fn record(audit: &AuditLogger, start: Instant, bytes_out: usize, event: &str) {
    let ms = start.elapsed().as_millis() as u64;
    let entry = AuditEntry::new("code.sandbox.wasm.run", "tools.wasm.run", ms, bytes_out, event);
    audit.append(&entry);
}

/// Bounds-checked read from guest linear memory:
/// `start+length` overflow or `start+length > memory.len()` yields
/// `OOB_MEMORY`; a zero-length read is valid as long as `start <=
/// memory.len()` (one-past-the-end is a legal empty read).
pub fn checked_read(memory: &[u8], start: usize, len: usize) -> Result<&[u8], SandboxError> {
    if len == 0 {
        return if start <= memory.len() {
            Ok(&[])
        } else {
            Err(oob(start, start, memory.len()))
        };
    }
    let end = match start.checked_add(len) {
        Some(end) => end,
        None => return Err(SandboxError::new(SandboxErrorCode::OobMemory, "start + length overflowed")),
    };
    if end > memory.len() {
        return Err(oob(start, end, memory.len()));
    }
    Ok(&memory[start..end])
}

fn oob(start: usize, end: usize, memory_len: usize) -> SandboxError {
    SandboxError::new(
        SandboxErrorCode::OobMemory,
        format!("range {start}..{end} exceeds memory length {memory_len}"),
    )
}
