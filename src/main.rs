//! Trustflow CLI entry point.
//!
//! Provides `check-config`, `list`, and `run` subcommands for validating a
//! configuration file, listing the built-in functions, and running a
//! pipeline of built-ins against a trusted or untrusted input.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use trustflow::config::{load_config, load_default_config, Config};
use trustflow::function::Function;
use trustflow::pipeline::{Pipeline, RunReport};
use trustflow::{builtin, logging, TaintedValue};

/// Trustflow: trust-gated pipeline runner.
#[derive(Parser)]
#[command(name = "trustflow", version, about)]
struct Cli {
    /// Config file. Defaults to `~/.trustflow/config.toml` when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Load a config file and print the effective trust settings.
    CheckConfig {
        /// Path to the TOML file.
        path: PathBuf,
    },
    /// Print the built-in functions as JSON.
    List,
    /// Run a pipeline of built-in functions.
    Run {
        /// Mark the input untrusted.
        #[arg(long)]
        untrusted: bool,
        /// Cancel the run after this many milliseconds.
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Main input.
        input: String,
        /// Built-in function names, in order.
        #[arg(required = true)]
        steps: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::CheckConfig { path } => handle_check_config(&path),
        Command::List => {
            let config = resolve_config(cli.config.as_deref())?;
            logging::init_cli(&config.logging.level);
            handle_list(&config)
        }
        Command::Run {
            untrusted,
            timeout_ms,
            input,
            steps,
        } => {
            let config = resolve_config(cli.config.as_deref())?;
            let _guard = match &config.logging.dir {
                Some(dir) => Some(logging::init_production(dir, &config.logging.level)?),
                None => {
                    logging::init_cli(&config.logging.level);
                    None
                }
            };
            handle_run(&config, untrusted, timeout_ms, input, &steps).await
        }
    }
}

fn resolve_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => {
            load_config(path).with_context(|| format!("failed to load {}", path.display()))
        }
        None => load_default_config().context("failed to load default config"),
    }
}

/// Validate a config file and print what it resolves to.
fn handle_check_config(path: &Path) -> anyhow::Result<()> {
    let config = load_config(path)?;
    let overrides: Vec<serde_json::Value> = config
        .trust
        .functions
        .iter()
        .map(|rule| {
            serde_json::json!({
                "skill": rule.skill,
                "function": rule.function,
                "sensitive": rule.sensitive,
                "force_output_untrusted": rule.force_output_untrusted,
            })
        })
        .collect();
    let summary = serde_json::json!({
        "default_trusted": config.trust.default_trusted,
        "overrides": overrides,
        "max_steps": config.pipeline.max_steps,
        "log_level": config.logging.level,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Print every built-in descriptor.
fn handle_list(config: &Config) -> anyhow::Result<()> {
    let views: Vec<_> = builtin::NAMES
        .iter()
        .filter_map(|name| builtin::lookup(name, &config.trust))
        .map(|function| function.descriptor().describe())
        .collect();
    println!("{}", serde_json::to_string_pretty(&views)?);
    Ok(())
}

/// Build and run a pipeline of built-ins.
async fn handle_run(
    config: &Config,
    untrusted: bool,
    timeout_ms: Option<u64>,
    input: String,
    steps: &[String],
) -> anyhow::Result<()> {
    let functions = steps
        .iter()
        .map(|name| {
            builtin::lookup(name, &config.trust).ok_or_else(|| {
                anyhow::anyhow!(
                    "unknown function '{name}', expected one of: {}",
                    builtin::NAMES.join(", ")
                )
            })
        })
        .collect::<anyhow::Result<Vec<Arc<dyn Function>>>>()?;
    let pipeline = Pipeline::from_steps(functions, &config.pipeline)?;

    let cancel = CancellationToken::new();
    if let Some(ms) = timeout_ms {
        let timer = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            debug!(timeout_ms = ms, "cancelling run");
            timer.cancel();
        });
    }

    info!(steps = pipeline.len(), untrusted, "starting run");
    let context = pipeline
        .run_input(TaintedValue::new(input, !untrusted), &cancel)
        .await;

    let report = RunReport::from_context(&context);
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
