//! Configuration loading and parsing

use anyhow::{Context, Result};
use recovery_bridge::{EngineOptions, EventId};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineOptions,
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HostConfig {
    /// Shared library exporting the two host entry points
    pub library: Option<PathBuf>,
    #[serde(default = "default_standard_symbol")]
    pub standard_symbol: String,
    #[serde(default = "default_validation_symbol")]
    pub validation_symbol: String,
    /// Event ids the built-in validation host treats as warnings
    #[serde(default = "default_warning_ids")]
    pub warning_ids: Vec<EventId>,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            library: None,
            standard_symbol: default_standard_symbol(),
            validation_symbol: default_validation_symbol(),
            warning_ids: default_warning_ids(),
        }
    }
}

fn default_standard_symbol() -> String {
    "callback".to_string()
}

fn default_validation_symbol() -> String {
    "validatorCallback".to_string()
}

fn default_warning_ids() -> Vec<EventId> {
    vec![1]
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Txt,
    Json,
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}
