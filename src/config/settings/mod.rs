
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::corpus::ChunkingConfig;
use crate::embeddings::cache::CACHE_FILE_NAME;

/// Environment variable holding the API key. The key is never written to
/// the TOML file.
pub const API_KEY_ENV_VAR: &str = "GEMINI_API_KEY";

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    /// UTF-8 text file holding the reference corpus
    #[serde(default)]
    pub corpus_path: Option<PathBuf>,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeminiConfig {
    pub base_url: Url,
    pub generation_model: String,
    pub embedding_model: String,
    /// Maximum texts per batch embedding call
    pub batch_size: usize,
    /// Initial output-token ceiling for generation calls
    pub max_output_tokens: u32,
    /// Retry budget shared by rate-limit and transient failures
    pub max_attempts: u32,
}

impl Default for GeminiConfig {
    #[inline]
    fn default() -> Self {
        let base_url = Url::parse(DEFAULT_BASE_URL).map_or_else(
            |_| unreachable!("default base URL is statically valid"),
            |url| url,
        );
        Self {
            base_url,
            generation_model: "gemini-2.5-pro".to_string(),
            embedding_model: "text-embedding-004".to_string(),
            batch_size: 50,
            max_output_tokens: 2048,
            max_attempts: 3,
        }
    }
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            gemini: GeminiConfig::default(),
            chunking: ChunkingConfig::default(),
            corpus_path: None,
            base_dir: PathBuf::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid base URL: {0} (must be http or https)")]
    InvalidBaseUrl(String),
    #[error("Invalid model name: {0:?} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid batch size: {0} (must be between 1 and 100)")]
    InvalidBatchSize(usize),
    #[error("Invalid output token ceiling: {0} (must be between 1 and 32768)")]
    InvalidMaxOutputTokens(u32),
    #[error("Invalid retry budget: {0} (must be between 1 and 10)")]
    InvalidMaxAttempts(u32),
    #[error("Invalid target segment size: {0} (must be between 100 and 10000)")]
    InvalidTargetSize(usize),
    #[error("Invalid overlap: {0} (must be smaller than the target segment size)")]
    InvalidOverlap(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                self.base_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gemini.validate()?;

        if !(100..=10_000).contains(&self.chunking.target_size) {
            return Err(ConfigError::InvalidTargetSize(self.chunking.target_size));
        }
        if self.chunking.overlap >= self.chunking.target_size {
            return Err(ConfigError::InvalidOverlap(self.chunking.overlap));
        }

        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.base_dir.join("config.toml")
    }

    /// Fixed, well-known location of the persisted embedding cache
    #[inline]
    pub fn cache_file_path(&self) -> PathBuf {
        self.base_dir.join(CACHE_FILE_NAME)
    }

    #[inline]
    pub fn default_config_dir() -> Result<PathBuf, ConfigError> {
        let base = dirs::config_dir().ok_or(ConfigError::DirectoryError)?;
        Ok(base.join("ottoman-scribe"))
    }
}

impl GeminiConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.scheme() != "http" && self.base_url.scheme() != "https" {
            return Err(ConfigError::InvalidBaseUrl(self.base_url.to_string()));
        }

        if self.generation_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.generation_model.clone()));
        }

        if self.embedding_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embedding_model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 100 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if self.max_output_tokens == 0 || self.max_output_tokens > 32_768 {
            return Err(ConfigError::InvalidMaxOutputTokens(self.max_output_tokens));
        }

        if self.max_attempts == 0 || self.max_attempts > 10 {
            return Err(ConfigError::InvalidMaxAttempts(self.max_attempts));
        }

        Ok(())
    }
}

/// Read the API key from the environment; empty values count as missing.
#[inline]
pub fn api_key_from_env() -> Option<String> {
    env::var(API_KEY_ENV_VAR)
        .ok()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
}
