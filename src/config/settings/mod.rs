#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::assistant::formatter::AnswerStyle;
use crate::embeddings::chunking::ChunkingConfig;
use crate::embeddings::inference::DEFAULT_EMBEDDING_DIMENSION;

pub const CONFIG_FILENAME: &str = "policy-rag.toml";
pub const TOKEN_ENV_VAR: &str = "HUGGINGFACEHUB_API_TOKEN";
pub const EMBEDDING_MODEL_ENV_VAR: &str = "POLICY_RAG_EMBEDDING_MODEL";
pub const CHAT_MODEL_ENV_VAR: &str = "POLICY_RAG_CHAT_MODEL";
pub const BASE_URL_ENV_VAR: &str = "POLICY_RAG_BASE_URL";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub inference: InferenceConfig,
    pub chunking: ChunkingConfig,
    pub retrieval: RetrievalConfig,
    pub history: HistoryConfig,
    pub answer: AnswerConfig,
    pub ingestion: IngestionConfig,
    pub paths: PathsConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            inference: InferenceConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            history: HistoryConfig::default(),
            answer: AnswerConfig::default(),
            ingestion: IngestionConfig::default(),
            paths: PathsConfig::default(),
            base_dir: PathBuf::from("."),
        }
    }
}

/// Remote inference endpoints shared by the embedding and chat clients.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InferenceConfig {
    pub base_url: String,
    pub embedding_model: String,
    pub chat_model: String,
    pub embedding_dimension: u32,
    pub batch_size: u32,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
    /// Bearer token, only ever read from the environment.
    #[serde(skip)]
    pub api_token: Option<String>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://router.huggingface.co".to_string(),
            embedding_model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            chat_model: "HuggingFaceH4/zephyr-7b-beta".to_string(),
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
            batch_size: 32,
            timeout_seconds: 30,
            retry_attempts: 3,
            api_token: None,
        }
    }
}

impl fmt::Debug for InferenceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceConfig")
            .field("base_url", &self.base_url)
            .field("embedding_model", &self.embedding_model)
            .field("chat_model", &self.chat_model)
            .field("embedding_dimension", &self.embedding_dimension)
            .field("batch_size", &self.batch_size)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("retry_attempts", &self.retry_attempts)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 3 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HistoryConfig {
    /// Number of user/assistant pairs forwarded to the chat model.
    pub max_turns: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { max_turns: 6 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnswerConfig {
    pub max_tokens: u32,
    pub temperature: f32,
    pub style: AnswerStyle,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            max_tokens: 512,
            temperature: 0.1,
            style: AnswerStyle::default(),
        }
    }
}

/// What ingestion does with a file it cannot read or parse.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OnError {
    #[default]
    Skip,
    Abort,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct IngestionConfig {
    pub on_error: OnError,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PathsConfig {
    pub documents_dir: PathBuf,
    pub index_dir: PathBuf,
    pub history_file: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            documents_dir: PathBuf::from("data/raw"),
            index_dir: PathBuf::from("data/vector_store"),
            history_file: PathBuf::from("data/chat_history.json"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid batch size: {0} (must be between 1 and 1000)")]
    InvalidBatchSize(u32),
    #[error("Invalid embedding dimension: {0} (must be between 1 and 8192)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid timeout: {0} (must be between 1 and 600 seconds)")]
    InvalidTimeout(u64),
    #[error("Invalid retry attempts: {0} (must be between 1 and 10)")]
    InvalidRetryAttempts(u32),
    #[error("Invalid chunk size: {0} (must be at least 1)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("Invalid top_k: {0} (must be at least 1)")]
    InvalidTopK(usize),
    #[error("Invalid max_tokens: {0} (must be at least 1)")]
    InvalidMaxTokens(u32),
    #[error("Invalid temperature: {0} (must be between 0.0 and 2.0)")]
    InvalidTemperature(f32),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    /// Load `policy-rag.toml` from `config_dir`, falling back to defaults when the
    /// file is missing, then apply environment overrides and validate.
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        Self::load_with_env(config_dir, |key| std::env::var(key).ok())
    }

    /// Same as [`Config::load`] with an explicit environment lookup.
    #[inline]
    pub fn load_with_env<P, F>(config_dir: P, lookup: F) -> Result<Self>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let config_path = config_dir.as_ref().join(CONFIG_FILENAME);

        let mut config = if config_path.exists() {
            let content = fs::read_to_string(&config_path).with_context(|| {
                format!("Failed to read config file: {}", config_path.display())
            })?;
            toml::from_str::<Self>(&content).with_context(|| {
                format!("Failed to parse config file: {}", config_path.display())
            })?
        } else {
            debug!(
                "No config file at {}, using defaults",
                config_path.display()
            );
            Self::default()
        };
        config.base_dir = config_dir.as_ref().to_path_buf();
        config.apply_env_overrides(lookup);

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    /// Overlay settings that may come from the process environment.
    #[inline]
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(token) = non_empty(TOKEN_ENV_VAR) {
            self.inference.api_token = Some(token);
        }
        if let Some(model) = non_empty(EMBEDDING_MODEL_ENV_VAR) {
            self.inference.embedding_model = model;
        }
        if let Some(model) = non_empty(CHAT_MODEL_ENV_VAR) {
            self.inference.chat_model = model;
        }
        if let Some(base_url) = non_empty(BASE_URL_ENV_VAR) {
            self.inference.base_url = base_url;
        }
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
        self.inference.validate()?;

        let chunking = &self.chunking;
        if chunking.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize(chunking.chunk_size));
        }
        if chunking.chunk_overlap >= chunking.chunk_size {
            return Err(ConfigError::OverlapTooLarge(
                chunking.chunk_overlap,
                chunking.chunk_size,
            ));
        }

        if self.retrieval.top_k == 0 {
            return Err(ConfigError::InvalidTopK(self.retrieval.top_k));
        }

        if self.answer.max_tokens == 0 {
            return Err(ConfigError::InvalidMaxTokens(self.answer.max_tokens));
        }
        if !(0.0..=2.0).contains(&self.answer.temperature) {
            return Err(ConfigError::InvalidTemperature(self.answer.temperature));
        }

        Ok(())
    }

    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.base_dir.join(CONFIG_FILENAME)
    }

    /// Folder scanned for `.txt` and `.pdf` documents
    #[inline]
    pub fn documents_dir(&self) -> PathBuf {
        self.base_dir.join(&self.paths.documents_dir)
    }

    /// Directory holding the LanceDB vector store
    #[inline]
    pub fn index_dir(&self) -> PathBuf {
        self.base_dir.join(&self.paths.index_dir)
    }

    #[inline]
    pub fn history_file(&self) -> PathBuf {
        self.base_dir.join(&self.paths.history_file)
    }

    #[inline]
    pub fn has_api_token(&self) -> bool {
        self.inference.api_token.is_some()
    }
}

impl InferenceConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.base_url()?;

        if self.embedding_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.embedding_model.clone()));
        }
        if self.chat_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.chat_model.clone()));
        }

        if self.batch_size == 0 || self.batch_size > 1000 {
            return Err(ConfigError::InvalidBatchSize(self.batch_size));
        }

        if !(1..=8192).contains(&self.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding_dimension,
            ));
        }

        if !(1..=600).contains(&self.timeout_seconds) {
            return Err(ConfigError::InvalidTimeout(self.timeout_seconds));
        }

        if !(1..=10).contains(&self.retry_attempts) {
            return Err(ConfigError::InvalidRetryAttempts(self.retry_attempts));
        }

        Ok(())
    }

    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let url =
            Url::parse(&self.base_url).map_err(|_| ConfigError::InvalidUrl(self.base_url.clone()))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidProtocol(url.scheme().to_string()));
        }
        Ok(url)
    }
}
