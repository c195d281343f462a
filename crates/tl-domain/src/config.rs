use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level configuration, loaded from TOML. Every sub-config derives
/// `Default` and is `#[serde(default)]` so a caller can supply a partial
/// file and still get a usable `Config`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub sandbox: SandboxConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub run: RunConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LlmConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key_env: None,
            model: default_model(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

/// Tool registry configuration: where to load the JSON manifest from
/// (`{tools:[{name, description, schema, command, timeoutSec,
/// envPassthrough?}, …]}`) and the fallback per-tool timeout applied when
/// a spec's own `timeoutSec` is 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ToolsConfig {
    #[serde(default)]
    pub manifest_path: Option<String>,
    #[serde(default = "default_tool_timeout_seconds")]
    pub default_timeout_seconds: u64,
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            manifest_path: None,
            default_timeout_seconds: default_tool_timeout_seconds(),
            max_output_bytes: default_max_output_bytes(),
        }
    }
}

fn default_tool_timeout_seconds() -> u64 {
    30
}

fn default_max_output_bytes() -> usize {
    1024 * 1024
}

/// Default sandbox limits, used when a sandbox request omits `limits` or
/// sets a field to `<= 0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SandboxConfig {
    #[serde(default = "default_wall_ms")]
    pub default_wall_ms: u64,
    #[serde(default = "default_output_kb")]
    pub default_output_kb: u64,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            default_wall_ms: default_wall_ms(),
            default_output_kb: default_output_kb(),
        }
    }
}

fn default_wall_ms() -> u64 {
    1000
}

fn default_output_kb() -> u64 {
    64
}

impl SandboxConfig {
    /// `default_wall_ms` as configured, or the documented fallback if the
    /// field was explicitly set to 0.
    pub fn effective_wall_ms(&self) -> u64 {
        if self.default_wall_ms > 0 {
            self.default_wall_ms
        } else {
            default_wall_ms()
        }
    }

    /// `default_output_kb` as configured, or the documented fallback if the
    /// field was explicitly set to 0 — matches the warning `validate()`
    /// raises for that case.
    pub fn effective_output_kb(&self) -> u64 {
        if self.default_output_kb > 0 {
            self.default_output_kb
        } else {
            default_output_kb()
        }
    }
}

/// Audit log configuration: redaction patterns and an optional repo-root
/// override (tests set this to a tempdir rather than relying on ancestor
/// walk).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AuditConfig {
    #[serde(default)]
    pub redaction_patterns: Vec<String>,
    #[serde(default)]
    pub repo_root: Option<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            redaction_patterns: Vec::new(),
            repo_root: None,
        }
    }
}

/// Step-loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RunConfig {
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    #[serde(default)]
    pub debug: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            debug: false,
        }
    }
}

fn default_max_steps() -> usize {
    25
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

impl fmt::Display for ConfigSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSeverity::Error => write!(f, "ERROR"),
            ConfigSeverity::Warning => write!(f, "WARNING"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.field, self.message)
    }
}

impl Config {
    /// Non-fatal validation: collects every problem rather than failing on
    /// the first bad field, so a caller can decide whether to proceed on
    /// warnings alone.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.llm.base_url.trim().is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "llm.base_url".to_string(),
                message: "must not be empty".to_string(),
            });
        }

        if self.run.max_steps == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "run.max_steps".to_string(),
                message: "must be >= 1".to_string(),
            });
        }

        if self.sandbox.default_output_kb == 0 {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "sandbox.default_output_kb".to_string(),
                message: "0 disables sandbox output entirely; falling back to 64".to_string(),
            });
        }

        if self.tools.manifest_path.is_none() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "tools.manifest_path".to_string(),
                message: "no tool manifest configured; registry will be empty".to_string(),
            });
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sandbox_config_effective_limits_pass_through_when_positive() {
        let cfg = SandboxConfig { default_wall_ms: 2000, default_output_kb: 128 };
        assert_eq!(cfg.effective_wall_ms(), 2000);
        assert_eq!(cfg.effective_output_kb(), 128);
    }

    #[test]
    fn sandbox_config_effective_limits_fall_back_to_defaults_when_zero() {
        let cfg = SandboxConfig { default_wall_ms: 0, default_output_kb: 0 };
        assert_eq!(cfg.effective_wall_ms(), default_wall_ms());
        assert_eq!(cfg.effective_output_kb(), default_output_kb());
    }

    #[test]
    fn default_config_flags_missing_base_url_and_manifest() {
        let cfg = Config::default();
        let errs = cfg.validate();
        assert!(errs
            .iter()
            .any(|e| e.field == "llm.base_url" && e.severity == ConfigSeverity::Error));
        assert!(errs
            .iter()
            .any(|e| e.field == "tools.manifest_path" && e.severity == ConfigSeverity::Warning));
    }

    #[test]
    fn valid_config_has_no_errors() {
        let mut cfg = Config::default();
        cfg.llm.base_url = "https://example.test".to_string();
        cfg.tools.manifest_path = Some("tools.json".to_string());
        let errs = cfg.validate();
        assert!(errs.iter().all(|e| e.severity != ConfigSeverity::Error));
    }

    #[test]
    fn config_error_display_matches_tag_field_message_shape() {
        let e = ConfigError {
            severity: ConfigSeverity::Error,
            field: "llm.base_url".to_string(),
            message: "must not be empty".to_string(),
        };
        assert_eq!(e.to_string(), "[ERROR] llm.base_url: must not be empty");
    }
}
