//! Process entry point: parse args, load config and the tool manifest, wire
//! up the provider/registry/audit logger, run one step loop to completion,
//! and print the result.
//!
//! Intentionally thin — no subcommands, no REPL, no daemon mode.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tl_domain::config::{Config, ConfigSeverity};
use tl_providers::{OpenAiCompatProvider, Sampling, StderrDebugSink};
use tl_runtime::{CancelToken, StepLoopConfig, StepOutcome, ToolRegistry};
use tl_transcript::Transcript;

/// Run a single turn against a configured model and tool registry.
#[derive(Debug, Parser)]
#[command(name = "turnloop", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Path to the JSON tool manifest, overriding `tools.manifest_path`.
    #[arg(long)]
    manifest: Option<PathBuf>,

    /// The user message to run.
    #[arg(long)]
    message: String,

    /// Dump chat requests/responses to stderr.
    #[arg(long)]
    debug: bool,

    /// Override the configured step budget.
    #[arg(long)]
    max_steps: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = load_config(&cli.config).context("loading configuration")?;

    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count()
        );
    }

    let manifest_path = cli.manifest.clone().or_else(|| config.tools.manifest_path.clone().map(PathBuf::from));
    let registry = match manifest_path {
        Some(path) => {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("reading tool manifest {}", path.display()))?;
            ToolRegistry::from_manifest_json(&bytes)
                .with_context(|| format!("parsing tool manifest {}", path.display()))?
        }
        None => {
            tracing::warn!("no tool manifest configured; running with an empty tool registry");
            ToolRegistry::empty()
        }
    };
    tracing::info!(tools = registry.len(), "tool registry ready");

    let api_key = config
        .llm
        .api_key_env
        .as_ref()
        .and_then(|var| std::env::var(var).ok());

    let audit_root = config.audit.repo_root.clone().map(PathBuf::from);
    let known_secrets: Vec<String> = api_key.iter().cloned().collect();
    let audit = tl_audit::AuditLogger::new(audit_root, &config.audit.redaction_patterns, &known_secrets);

    let provider = OpenAiCompatProvider::new(
        config.llm.base_url.clone(),
        api_key,
        Duration::from_millis(config.llm.request_timeout_ms),
    );

    let transcript = Transcript::seed([tl_domain::Message::user(cli.message)])
        .context("seeding transcript")?;
    let cancel = CancelToken::new();

    let debug_sink = (cli.debug || config.run.debug).then_some(StderrDebugSink);
    let max_steps = cli.max_steps.unwrap_or(config.run.max_steps) as u32;

    let step_config = StepLoopConfig {
        model: config.llm.model.clone(),
        max_steps,
        default_tool_timeout: Duration::from_secs(config.tools.default_timeout_seconds),
        max_output_bytes: config.tools.max_output_bytes,
        sampling: Sampling::Unset,
        sandbox_defaults: tl_sandbox::SandboxDefaults {
            wall_ms: config.sandbox.effective_wall_ms(),
            output_kb: config.sandbox.effective_output_kb(),
        },
    };

    let (_, outcome) = tl_runtime::run(
        &provider,
        &registry,
        &audit,
        transcript,
        &cancel,
        &step_config,
        debug_sink.as_ref().map(|s| s as &dyn tl_providers::DebugSink),
    )
    .await;

    match outcome {
        StepOutcome::Completed { content } => {
            println!("{content}");
            Ok(())
        }
        StepOutcome::Failed { message } => {
            eprintln!("{message}");
            std::process::exit(1);
        }
    }
}

fn load_config(path: &std::path::Path) -> anyhow::Result<Config> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "config file not found; using defaults");
        return Ok(Config::default());
    }
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}
