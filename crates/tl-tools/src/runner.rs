//! Process tool runner.
//!
//! Spawns a registered external tool, feeds `json_input` to its standard
//! input, enforces a per-call deadline, and captures bounded stdout/stderr.
//! Re-entrant: callers may run multiple invocations concurrently, each with
//! its own [`tl_domain::ToolSpec`], input, and deadline — no process-wide
//! lock is held across a child's lifetime.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

use tl_audit::{AuditEntry, AuditLogger};
use tl_domain::ToolSpec;

use crate::buffer::BoundedBuffer;
use crate::error::ToolError;

/// Deadline applied when `spec.timeout_seconds` is 0 (documented default).
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
/// Output cap applied when a caller doesn't override it (documented
/// default; independent of the sandbox's `output_kb`).
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// Runs `spec` with `json_input` on its stdin, returning the raw stdout
/// bytes on success. Appends exactly one audit entry for every terminal
/// outcome, matching the classification returned.
pub async fn run(
    audit: &AuditLogger,
    spec: &ToolSpec,
    json_input: &[u8],
    outer_deadline: Duration,
    max_output_bytes: usize,
) -> Result<Vec<u8>, ToolError> {
    let span = tracing::info_span!("tool.call", tool_name = %spec.name);
    let _guard = span.enter();

    let start = Instant::now();
    let result = run_inner(spec, json_input, outer_deadline, max_output_bytes).await;
    let elapsed_ms = start.elapsed().as_millis() as u64;

    let (bytes_out, event, extra) = match &result {
        Ok(stdout) => (stdout.len(), "success".to_string(), None),
        Err(e) => (0, e.kind.to_string(), Some(e.message.clone())),
    };

    let mut entry = AuditEntry::new(&spec.name, "tools.exec.run", elapsed_ms, bytes_out, event);
    if let Some(message) = extra {
        entry = entry.with_field("message", message);
    }
    audit.append(&entry);

    result
}

async fn run_inner(
    spec: &ToolSpec,
    json_input: &[u8],
    outer_deadline: Duration,
    max_output_bytes: usize,
) -> Result<Vec<u8>, ToolError> {
    let Some(program) = spec.command.first() else {
        return Err(ToolError::spawn_failure("empty command"));
    };

    // Environment construction starts from an empty map and adds only
    // whitelisted keys — never from the ambient environment with keys
    // removed.
    let mut env: HashMap<String, String> = HashMap::new();
    for key in &spec.env_passthrough {
        if let Ok(value) = std::env::var(key) {
            env.insert(key.clone(), value);
        }
    }

    let mut cmd = Command::new(program);
    cmd.args(&spec.command[1..]);
    cmd.env_clear();
    cmd.envs(&env);
    cmd.stdin(Stdio::piped());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    // If the caller drops this future before it resolves (deadline race,
    // cancellation), the child must not outlive it.
    cmd.kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .map_err(|e| ToolError::spawn_failure(format!("failed to spawn {program}: {e}")))?;

    let stdin = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    let input = json_input.to_vec();

    let io = async {
        let write_fut = async {
            if let Some(mut stdin) = stdin {
                let _ = stdin.write_all(&input).await;
                drop(stdin);
            }
        };
        let (_, stdout_buf, stderr_buf, status) = tokio::join!(
            write_fut,
            read_capped(stdout, max_output_bytes),
            read_capped(stderr, max_output_bytes),
            child.wait(),
        );
        (stdout_buf, stderr_buf, status)
    };

    let configured_timeout = if spec.timeout_seconds == 0 {
        DEFAULT_TIMEOUT_SECONDS
    } else {
        spec.timeout_seconds
    };
    let effective_deadline = Duration::from_secs(configured_timeout).min(outer_deadline);

    tokio::select! {
        (stdout_buf, _stderr_buf, status) = io => {
            match status {
                Ok(status) if status.success() => Ok(stdout_buf),
                Ok(status) => Err(ToolError::non_zero_exit(&_stderr_buf, status.code())),
                Err(e) => Err(ToolError::spawn_failure(format!("failed to wait on child: {e}"))),
            }
        }
        _ = tokio::time::sleep(effective_deadline) => {
            Err(ToolError::timeout())
        }
    }
}

async fn read_capped<R: AsyncRead + Unpin>(reader: Option<R>, cap: usize) -> Vec<u8> {
    let Some(mut reader) = reader else {
        return Vec::new();
    };
    let mut buf = BoundedBuffer::new(cap);
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buf.push(&chunk[..n]),
        }
    }
    buf.into_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tl_domain::ToolSpec;

    fn logger() -> AuditLogger {
        let dir = tempfile::tempdir().unwrap();
        // Leak the tempdir so the path stays valid for the logger's
        // lifetime within a single test.
        let path = dir.into_path();
        AuditLogger::new(Some(path), &[], &[])
    }

    fn cat_spec(timeout_seconds: u64) -> ToolSpec {
        ToolSpec {
            name: "cat".to_string(),
            command: vec!["cat".to_string()],
            timeout_seconds,
            env_passthrough: vec![],
        }
    }

    #[tokio::test]
    async fn echoes_stdin_to_stdout_on_success() {
        let audit = logger();
        let spec = cat_spec(5);
        let out = run(&audit, &spec, b"hello", Duration::from_secs(5), 1024)
            .await
            .unwrap();
        assert_eq!(out, b"hello");
    }

    #[tokio::test]
    async fn non_zero_exit_carries_trimmed_stderr() {
        let audit = logger();
        let spec = ToolSpec {
            name: "sh".to_string(),
            command: vec![
                "sh".to_string(),
                "-c".to_string(),
                "echo boom 1>&2; exit 3".to_string(),
            ],
            timeout_seconds: 5,
            env_passthrough: vec![],
        };
        let err = run(&audit, &spec, b"", Duration::from_secs(5), 1024)
            .await
            .unwrap_err();
        assert_eq!(err.kind.as_str(), "NonZeroExit");
        assert_eq!(err.message, "boom");
    }

    #[tokio::test]
    async fn non_zero_exit_with_empty_stderr_carries_generic_message() {
        let audit = logger();
        let spec = ToolSpec {
            name: "sh".to_string(),
            command: vec!["sh".to_string(), "-c".to_string(), "exit 7".to_string()],
            timeout_seconds: 5,
            env_passthrough: vec![],
        };
        let err = run(&audit, &spec, b"", Duration::from_secs(5), 1024)
            .await
            .unwrap_err();
        assert!(err.message.contains('7'));
    }

    #[tokio::test]
    async fn deadline_expiry_returns_timeout() {
        let audit = logger();
        let spec = ToolSpec {
            name: "sleep".to_string(),
            command: vec!["sleep".to_string(), "2".to_string()],
            timeout_seconds: 1,
            env_passthrough: vec![],
        };
        let start = Instant::now();
        let err = run(&audit, &spec, b"", Duration::from_secs(3), 1024)
            .await
            .unwrap_err();
        assert_eq!(err.kind.as_str(), "Timeout");
        assert_eq!(err.message, "tool timed out");
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn outer_deadline_wins_when_tighter_than_spec_timeout() {
        let audit = logger();
        let spec = ToolSpec {
            name: "sleep".to_string(),
            command: vec!["sleep".to_string(), "5".to_string()],
            timeout_seconds: 10,
            env_passthrough: vec![],
        };
        let err = run(&audit, &spec, b"", Duration::from_millis(200), 1024)
            .await
            .unwrap_err();
        assert_eq!(err.kind.as_str(), "Timeout");
    }

    #[tokio::test]
    async fn spawn_failure_for_missing_executable() {
        let audit = logger();
        let spec = ToolSpec {
            name: "missing".to_string(),
            command: vec!["/no/such/executable-xyz".to_string()],
            timeout_seconds: 1,
            env_passthrough: vec![],
        };
        let err = run(&audit, &spec, b"", Duration::from_secs(1), 1024)
            .await
            .unwrap_err();
        assert_eq!(err.kind.as_str(), "SpawnFailure");
    }

    #[tokio::test]
    async fn output_is_capped_at_max_output_bytes() {
        let audit = logger();
        let spec = ToolSpec {
            name: "sh".to_string(),
            command: vec![
                "sh".to_string(),
                "-c".to_string(),
                "head -c 100 /dev/zero".to_string(),
            ],
            timeout_seconds: 5,
            env_passthrough: vec![],
        };
        let out = run(&audit, &spec, b"", Duration::from_secs(5), 10)
            .await
            .unwrap();
        assert_eq!(out.len(), 10);
    }

    #[tokio::test]
    async fn env_passthrough_only_copies_whitelisted_keys() {
        std::env::set_var("TL_TOOLS_TEST_VAR", "visible");
        std::env::set_var("TL_TOOLS_TEST_HIDDEN", "hidden");
        let audit = logger();
        let spec = ToolSpec {
            name: "sh".to_string(),
            command: vec![
                "sh".to_string(),
                "-c".to_string(),
                "printf '%s|%s' \"$TL_TOOLS_TEST_VAR\" \"$TL_TOOLS_TEST_HIDDEN\"".to_string(),
            ],
            timeout_seconds: 5,
            env_passthrough: vec!["TL_TOOLS_TEST_VAR".to_string()],
        };
        let out = run(&audit, &spec, b"", Duration::from_secs(5), 1024)
            .await
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "visible|");
    }
}
