//! Configuration for the extraction CLI, loaded from `docent.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Directory repositories are cloned into.
    pub data_dir: PathBuf,
    /// Directory artifacts are written under.
    pub output_dir: PathBuf,
    /// Repository URLs to sync and process.
    pub repositories: Vec<String>,
    /// Path to a pretrained `tokenizer.json` used for budgeting.
    pub tokenizer_file: Option<PathBuf>,
    /// Per-file token ceiling; files over it are skipped.
    pub token_limit: Option<usize>,
    pub model: ModelConfig,
    pub pipeline: PipelineSettings,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            output_dir: PathBuf::from("./output"),
            repositories: Vec::new(),
            tokenizer_file: None,
            token_limit: None,
            model: ModelConfig::default(),
            pipeline: PipelineSettings::default(),
        }
    }
}

/// Model endpoint settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// OpenAI-compatible base URL.
    pub base_url: String,
    /// Model identifier sent with each request.
    pub name: String,
    /// Environment variable holding the API key; unset means no auth header.
    pub api_key_env: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            name: "google/gemini-2.5-flash-preview-05-20".to_string(),
            api_key_env: "DOCENT_API_KEY".to_string(),
        }
    }
}

impl ModelConfig {
    /// Resolves the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok()
    }
}

/// Pipeline tuning knobs.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Maximum files in flight at once.
    pub concurrency: usize,
    /// Total model-call attempts per extraction.
    pub retries: u32,
    /// Fixed delay between attempts, in milliseconds.
    pub delay_ms: u64,
    /// Maximum repositories cloned/pulled at once.
    pub sync_workers: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            concurrency: 50,
            retries: 2,
            delay_ms: 1000,
            sync_workers: 5,
        }
    }
}

impl PipelineSettings {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl ExtractConfig {
    /// Reads the config file at `path`; a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }
}
