use serde::Deserialize;

/// Documented default for `output_kb` when absent or non-positive.
pub const DEFAULT_OUTPUT_KB: u64 = 64;
/// Documented default for `wall_ms` when absent or non-positive.
pub const DEFAULT_WALL_MS: u64 = 1000;

/// Wire shape of `limits` — every field is optional and, for the script
/// sandbox, a value that is absent or `<= 0` falls back to its default.
/// The WASM sandbox validates these explicitly instead rather than
/// silently defaulting, since it has no safe default for guest memory.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawLimits {
    #[serde(default)]
    pub wall_ms: Option<i64>,
    #[serde(default)]
    pub output_kb: Option<i64>,
    #[serde(default)]
    pub mem_pages: Option<i64>,
}

fn positive_or(v: Option<i64>, default: u64) -> u64 {
    match v {
        Some(n) if n > 0 => n as u64,
        _ => default,
    }
}

/// The fallback limits applied when a script request's own `limits` are
/// absent or `<= 0`. Callers build this from `SandboxConfig` (or fall back
/// to [`DEFAULT_WALL_MS`]/[`DEFAULT_OUTPUT_KB`] themselves) rather than the
/// executor hardcoding a single, unconfigurable default.
#[derive(Debug, Clone, Copy)]
pub struct SandboxDefaults {
    pub wall_ms: u64,
    pub output_kb: u64,
}

impl Default for SandboxDefaults {
    fn default() -> Self {
        Self {
            wall_ms: DEFAULT_WALL_MS,
            output_kb: DEFAULT_OUTPUT_KB,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptRequest {
    pub source: String,
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub limits: RawLimits,
}

impl ScriptRequest {
    pub fn effective_wall_ms(&self, defaults: &SandboxDefaults) -> u64 {
        positive_or(self.limits.wall_ms, defaults.wall_ms)
    }

    pub fn effective_output_kb(&self, defaults: &SandboxDefaults) -> u64 {
        positive_or(self.limits.output_kb, defaults.output_kb)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WasmRequest {
    pub module_b64: String,
    #[serde(default)]
    pub entry: Option<String>,
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub limits: RawLimits,
}
