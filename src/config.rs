use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub graphrag: GraphRagConfig,
    pub generation: GenerationConfig,
    pub embeddings: EmbeddingsConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

/// Core configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GraphRagConfig {
    pub db_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Generation backend configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Extraction prompt with {input}, {format} and {source} placeholders.
    pub template: String,
}

/// Embeddings configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsConfig {
    pub model: String,
    pub dimensions: usize,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

/// Retrieval expansion configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_seed_k")]
    pub seed_k: usize,
    #[serde(default = "default_per_seed_limit")]
    pub per_seed_limit: usize,
    #[serde(default = "default_global_cap")]
    pub global_cap: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            seed_k: default_seed_k(),
            per_seed_limit: default_per_seed_limit(),
            global_cap: default_global_cap(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_base_url() -> String {
    "http://127.0.0.1:11434".to_string()
}

fn default_temperature() -> f64 {
    0.0
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_cache_capacity() -> usize {
    1000
}

fn default_seed_k() -> usize {
    5
}

fn default_per_seed_limit() -> usize {
    10
}

fn default_global_cap() -> usize {
    20
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in GRAPHRAG_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignore errors - file is optional)
        let _ = dotenv::dotenv();

        let config_path = std::env::var("GRAPHRAG_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .context("Failed to parse config.toml")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        url::Url::parse(&self.generation.base_url).with_context(|| {
            format!(
                "generation.base_url is not a valid URL: {}",
                self.generation.base_url
            )
        })?;

        if self.generation.temperature < 0.0 || self.generation.temperature > 2.0 {
            anyhow::bail!("generation.temperature must be between 0.0 and 2.0");
        }

        if self.generation.timeout_secs == 0 {
            anyhow::bail!("generation.timeout_secs must be greater than 0");
        }

        if !self.generation.template.contains("{input}") {
            anyhow::bail!("generation.template must contain an {{input}} placeholder");
        }

        if self.embeddings.dimensions == 0 {
            anyhow::bail!("embeddings.dimensions must be greater than 0");
        }

        if self.retrieval.seed_k == 0 {
            anyhow::bail!("retrieval.seed_k must be greater than 0");
        }

        if self.retrieval.per_seed_limit == 0 {
            anyhow::bail!("retrieval.per_seed_limit must be greater than 0");
        }

        if self.retrieval.global_cap == 0 {
            anyhow::bail!("retrieval.global_cap must be greater than 0");
        }

        Ok(())
    }

    /// Get database path
    pub fn db_path(&self) -> &Path {
        &self.graphrag.db_path
    }
}
