//! Configuration loading.
//!
//! A single TOML file. Every section is optional, so an empty file is a
//! valid configuration:
//! - `[trust]`: policy default and per-function overrides
//! - `[logging]`: level and optional JSON log directory
//! - `[pipeline]`: step limit

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::trust::TrustConfig;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Trust policy configuration.
    #[serde(default)]
    pub trust: TrustConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Pipeline limits.
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily-rotated JSON logs. Console only when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

/// Pipeline limits.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Maximum number of steps in one pipeline.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
        }
    }
}

// Default value functions for serde

fn default_log_level() -> String {
    "info".to_owned()
}
fn default_max_steps() -> usize {
    64
}

/// Load configuration from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config at {}: {e}", path.display()))?;
    let config: Config = toml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("failed to parse config at {}: {e}", path.display()))?;
    Ok(config)
}

/// Resolve the default config directory (`~/.trustflow/`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_dir() -> anyhow::Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.home_dir().join(".trustflow"))
}

/// Load `~/.trustflow/config.toml`, falling back to defaults when absent.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed, or the
/// home directory cannot be determined.
pub fn load_default_config() -> anyhow::Result<Config> {
    let path = config_dir()?.join("config.toml");
    if !path.exists() {
        return Ok(Config::default());
    }
    load_config(&path)
}
