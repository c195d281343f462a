use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::entry::AuditEntry;

/// Appends NDJSON audit records under `<repo_root>/.goagent/audit/`,
/// rotating on UTC date change. The path is recomputed on every call, so
/// a midnight crossing between two invocations naturally lands them in
/// adjacent files — there is no explicit rotation step.
pub struct AuditLogger {
    root: PathBuf,
    redaction: Vec<Regex>,
    secrets: Vec<String>,
}

impl AuditLogger {
    /// `repo_root_override` lets callers (tests, or configuration) pin the
    /// root explicitly; otherwise the nearest ancestor of CWD containing a
    /// `.git` directory is treated as the project marker, falling back to
    /// CWD when none is found.
    ///
    /// `patterns` are user-configured regexes. `known_secrets` are literal
    /// values (API keys, tokens pulled from the environment) redacted by
    /// exact substring match rather than regex — a secret may itself contain
    /// regex metacharacters, so it is never compiled as a pattern.
    pub fn new(repo_root_override: Option<PathBuf>, patterns: &[String], known_secrets: &[String]) -> Self {
        let root = repo_root_override.unwrap_or_else(Self::resolve_repo_root);
        let redaction = patterns
            .iter()
            .filter_map(|p| match Regex::new(p) {
                Ok(re) => Some(re),
                Err(e) => {
                    tracing::warn!(pattern = %p, error = %e, "invalid redaction pattern, skipping");
                    None
                }
            })
            .collect();
        let secrets = known_secrets
            .iter()
            .filter(|s| !s.is_empty())
            .cloned()
            .collect();
        Self { root, redaction, secrets }
    }

    fn resolve_repo_root() -> PathBuf {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let mut dir: &Path = cwd.as_path();
        loop {
            if dir.join(".git").is_dir() {
                return dir.to_path_buf();
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => return cwd,
            }
        }
    }

    pub fn log_path_at(&self, now: DateTime<Utc>) -> PathBuf {
        let day = now.format("%Y%m%d").to_string();
        self.root.join(".goagent").join("audit").join(format!("{day}.log"))
    }

    fn log_path(&self) -> PathBuf {
        self.log_path_at(Utc::now())
    }

    fn redact(&self, line: &str) -> String {
        let mut out = line.to_string();
        for secret in &self.secrets {
            out = out.replace(secret.as_str(), "[REDACTED]");
        }
        for re in &self.redaction {
            out = re.replace_all(&out, "[REDACTED]").into_owned();
        }
        out
    }

    /// Best-effort: failures are logged and swallowed, never propagated to
    /// the originating operation.
    pub fn append(&self, entry: &AuditEntry) {
        if let Err(e) = self.try_append(entry) {
            tracing::warn!(error = %e, "audit write failed");
        }
    }

    fn try_append(&self, entry: &AuditEntry) -> std::io::Result<()> {
        let path = self.log_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                let _ = std::fs::set_permissions(parent, std::fs::Permissions::from_mode(0o755));
            }
        }

        let json = serde_json::to_string(entry)?;
        let mut line = self.redact(&json);
        line.push('\n');

        let mut options = std::fs::OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o644);
        }
        // One write_all of the fully-assembled line: atomicity of a single
        // NDJSON record is relied upon, so the line must never be built
        // incrementally against the open file.
        let mut file = options.open(&path)?;
        file.write_all(line.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    #[test]
    fn log_path_rotates_on_utc_date() {
        let dir = tempdir().unwrap();
        let logger = AuditLogger::new(Some(dir.path().to_path_buf()), &[], &[]);
        let d1 = Utc.with_ymd_and_hms(2026, 7, 25, 23, 59, 59).unwrap();
        let d2 = Utc.with_ymd_and_hms(2026, 7, 26, 0, 0, 1).unwrap();
        assert_ne!(logger.log_path_at(d1), logger.log_path_at(d2));
        assert!(logger.log_path_at(d1).ends_with("20260725.log"));
        assert!(logger.log_path_at(d2).ends_with("20260726.log"));
    }

    #[test]
    fn append_writes_single_newline_terminated_line() {
        let dir = tempdir().unwrap();
        let logger = AuditLogger::new(Some(dir.path().to_path_buf()), &[], &[]);
        let entry = AuditEntry::new("echo", "tools.exec.run", 12, 5, "success");
        logger.append(&entry);

        let path = logger.log_path();
        let contents = std::fs::read_to_string(path).unwrap();
        assert_eq!(contents.matches('\n').count(), 1);
        assert!(contents.ends_with('\n'));
        assert!(contents.contains("\"event\":\"success\""));
    }

    #[test]
    fn append_never_panics_when_root_is_unwritable() {
        // A root under a path that cannot be created (e.g. nested under a
        // plain file) must be swallowed, not panicked on.
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a dir").unwrap();
        let logger = AuditLogger::new(Some(blocker), &[], &[]);
        let entry = AuditEntry::new("echo", "tools.exec.run", 1, 0, "success");
        logger.append(&entry);
    }

    #[test]
    fn redaction_replaces_configured_patterns() {
        let dir = tempdir().unwrap();
        let logger = AuditLogger::new(
            Some(dir.path().to_path_buf()),
            &["sk-[A-Za-z0-9]+".to_string()],
            &[],
        );
        let entry = AuditEntry::new("echo", "tools.exec.run", 1, 0, "success")
            .with_field("detail", "token sk-abc123 leaked");
        logger.append(&entry);
        let contents = std::fs::read_to_string(logger.log_path()).unwrap();
        assert!(contents.contains("[REDACTED]"));
        assert!(!contents.contains("sk-abc123"));
    }

    #[test]
    fn redaction_replaces_literal_known_secrets() {
        let dir = tempdir().unwrap();
        let logger = AuditLogger::new(
            Some(dir.path().to_path_buf()),
            &[],
            &["super.secret+key".to_string()],
        );
        let entry = AuditEntry::new("echo", "tools.exec.run", 1, 0, "success")
            .with_field("detail", "leaked super.secret+key in stderr");
        logger.append(&entry);
        let contents = std::fs::read_to_string(logger.log_path()).unwrap();
        assert!(contents.contains("[REDACTED]"));
        assert!(!contents.contains("super.secret+key"));
    }
}
