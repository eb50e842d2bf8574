//! Configuration for the renova pipeline.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (ANTHROPIC_API_KEY, RENOVA_MODEL,
//!    RENOVA_DIRECTORY_URL)
//! 2. Config file (.renova/config.yaml)
//! 3. Defaults
//!
//! Config file discovery searches the current directory and its parents
//! for .renova/config.yaml, so a checkout-local file wins over nothing
//! and env always wins over the file.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Model the original agents pinned; override with RENOVA_MODEL
const DEFAULT_MODEL: &str = "claude-3-opus-20240229";

const DEFAULT_INTAKE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SEARCH_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RANK_TIMEOUT_SECS: u64 = 45;
const DEFAULT_STREAM_CEILING_SECS: u64 = 120;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<std::result::Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub anthropic: Option<AnthropicConfig>,
    #[serde(default)]
    pub directory: Option<DirectoryConfig>,
    #[serde(default)]
    pub timeouts: Option<TimeoutsConfig>,
    #[serde(default)]
    pub stream: Option<StreamConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnthropicConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectoryConfig {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimeoutsConfig {
    pub intake_seconds: Option<u64>,
    pub search_seconds: Option<u64>,
    pub rank_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamConfig {
    pub ceiling_seconds: Option<u64>,
}

/// Resolved configuration after merging env, file, and defaults
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Anthropic API key; without one the CLI runs the stub pipeline
    pub anthropic_api_key: Option<String>,
    pub model: String,
    /// Base URL of the professional directory service
    pub directory_url: Option<String>,
    pub intake_timeout: Duration,
    pub search_timeout: Duration,
    pub rank_timeout: Duration,
    /// Subscription ceiling for status streams
    pub stream_ceiling: Duration,
    /// Path of the config file actually used, if any
    pub config_file: Option<PathBuf>,
}

impl ResolvedConfig {
    /// True when every live capability has what it needs
    pub fn has_live_credentials(&self) -> bool {
        self.anthropic_api_key.is_some() && self.directory_url.is_some()
    }

    fn from_sources(file: Option<ConfigFile>, file_path: Option<PathBuf>) -> Self {
        let file = file.unwrap_or_default();
        let anthropic = file.anthropic.unwrap_or_default();
        let directory = file.directory.unwrap_or_default();
        let timeouts = file.timeouts.unwrap_or_default();
        let stream = file.stream.unwrap_or_default();

        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|v| !v.is_empty())
            .or(anthropic.api_key);

        let model = std::env::var("RENOVA_MODEL")
            .ok()
            .filter(|v| !v.is_empty())
            .or(anthropic.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let directory_url = std::env::var("RENOVA_DIRECTORY_URL")
            .ok()
            .filter(|v| !v.is_empty())
            .or(directory.url);

        Self {
            anthropic_api_key: api_key,
            model,
            directory_url,
            intake_timeout: Duration::from_secs(
                timeouts.intake_seconds.unwrap_or(DEFAULT_INTAKE_TIMEOUT_SECS),
            ),
            search_timeout: Duration::from_secs(
                timeouts.search_seconds.unwrap_or(DEFAULT_SEARCH_TIMEOUT_SECS),
            ),
            rank_timeout: Duration::from_secs(
                timeouts.rank_seconds.unwrap_or(DEFAULT_RANK_TIMEOUT_SECS),
            ),
            stream_ceiling: Duration::from_secs(
                stream.ceiling_seconds.unwrap_or(DEFAULT_STREAM_CEILING_SECS),
            ),
            config_file: file_path,
        }
    }
}

/// Get the process-wide resolved configuration
pub fn get() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| resolve().map_err(|e| format!("{:#}", e)));
    match result {
        Ok(config) => Ok(config),
        Err(msg) => anyhow::bail!("configuration error: {}", msg),
    }
}

fn resolve() -> Result<ResolvedConfig> {
    match find_config_file()? {
        Some(path) => {
            let file = load_config_file(&path)?;
            Ok(ResolvedConfig::from_sources(Some(file), Some(path)))
        }
        None => Ok(ResolvedConfig::from_sources(None, None)),
    }
}

/// Search the current directory and its parents for .renova/config.yaml
fn find_config_file() -> Result<Option<PathBuf>> {
    let start = std::env::current_dir().context("Failed to read current directory")?;
    let mut dir: Option<&Path> = Some(start.as_path());

    while let Some(current) = dir {
        let candidate = current.join(".renova").join("config.yaml");
        if candidate.is_file() {
            return Ok(Some(candidate));
        }
        dir = current.parent();
    }

    Ok(None)
}

fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}
