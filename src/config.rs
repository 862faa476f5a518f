use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Model artifact configuration
    #[serde(default)]
    pub model: ModelConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> std::result::Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/default.toml".to_string());

        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: SPAM_API_)
            .add_source(
                config::Environment::with_prefix("SPAM_API")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Reject values the prediction path cannot work with
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.model.threshold) {
            return Err(AppError::Configuration(format!(
                "model.threshold must be within [0, 1], got {}",
                self.model.threshold
            )));
        }
        if self.model.max_len == 0 {
            return Err(AppError::Configuration(
                "model.max_len must be greater than zero".to_string(),
            ));
        }
        if self.model.intra_threads == 0 {
            return Err(AppError::Configuration(
                "model.intra_threads must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Socket address string for the HTTP listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Which scorer implementation serves `/predict`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModelVariant {
    /// Bag-of-words vectorizer + discrete probabilistic classifier
    #[default]
    Vectorizer,
    /// Word-index tokenizer + padded sequence model
    Sequence,
}

impl ModelVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelVariant::Vectorizer => "vectorizer",
            ModelVariant::Sequence => "sequence",
        }
    }
}

impl std::fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Scorer variant
    #[serde(default)]
    pub variant: ModelVariant,

    /// Tokenizer / vectorizer artifact
    #[serde(default = "default_tokenizer_path")]
    pub tokenizer_path: PathBuf,

    /// Classifier / sequence model artifact
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    /// Fixed sequence width for the sequence variant
    #[serde(default = "default_max_len")]
    pub max_len: usize,

    /// Spam probability cutoff for the sequence variant (strictly greater is spam)
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// ONNX Runtime intra-op threads for the sequence variant
    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,

    /// Load artifacts at startup instead of on the first prediction
    #[serde(default)]
    pub preload: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            variant: ModelVariant::default(),
            tokenizer_path: default_tokenizer_path(),
            model_path: default_model_path(),
            max_len: default_max_len(),
            threshold: default_threshold(),
            intra_threads: default_intra_threads(),
            preload: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            prometheus_enabled: true,
        }
    }
}

// Default value functions
fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_tokenizer_path() -> PathBuf {
    PathBuf::from("tokenizer.json")
}

fn default_model_path() -> PathBuf {
    PathBuf::from("spam_nb_model.json")
}

fn default_max_len() -> usize {
    100
}

fn default_threshold() -> f64 {
    0.5
}

fn default_intra_threads() -> usize {
    4
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}
