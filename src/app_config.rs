use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Application configuration module
/// This module handles the pipeline configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Target language code (ISO) applied to jobs that do not override it
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Translation engine config
    #[serde(default)]
    pub engine: EngineConfig,

    /// Pipeline config
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Path to the checkpoint database; empty string uses the platform default
    #[serde(default)]
    pub database_path: String,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation engine service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct EngineConfig {
    /// Engine service endpoint URL
    #[serde(default = "default_engine_endpoint")]
    pub endpoint: String,

    /// Request timeout in seconds, applied per block
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Number of immediate retries for transient engine errors
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Base backoff time in milliseconds between retries
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            endpoint: default_engine_endpoint(),
            timeout_secs: default_timeout_secs(),
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Pipeline concurrency configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PipelineConfig {
    /// Maximum concurrent engine calls within a single job
    #[serde(default = "default_job_concurrency")]
    pub job_concurrency: usize,

    /// Maximum concurrent engine calls across all jobs.
    /// The engine's capacity is the scarce resource, so this admission
    /// limit holds regardless of how many jobs run at once.
    #[serde(default = "default_global_concurrency")]
    pub global_concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            job_concurrency: default_job_concurrency(),
            global_concurrency: default_global_concurrency(),
        }
    }
}

/// Log level configuration
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Error level
    Error,
    /// Warn level
    Warn,
    /// Info level
    #[default]
    Info,
    /// Debug level
    Debug,
    /// Trace level
    Trace,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };
        write!(f, "{}", s)
    }
}

fn default_target_language() -> String {
    "en".to_string()
}

fn default_engine_endpoint() -> String {
    "http://localhost:8090".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_retry_count() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    500
}

fn default_job_concurrency() -> usize {
    4
}

fn default_global_concurrency() -> usize {
    8
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_language: default_target_language(),
            engine: EngineConfig::default(),
            pipeline: PipelineConfig::default(),
            database_path: String::new(),
            log_level: LogLevel::default(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.target_language.trim().is_empty() {
            return Err(anyhow!("Target language must not be empty"));
        }
        if self.engine.endpoint.trim().is_empty() {
            return Err(anyhow!("Engine endpoint must not be empty"));
        }
        url::Url::parse(&self.engine.endpoint)
            .with_context(|| format!("Invalid engine endpoint: {}", self.engine.endpoint))?;
        if self.pipeline.job_concurrency == 0 {
            return Err(anyhow!("Job concurrency must be at least 1"));
        }
        if self.pipeline.global_concurrency < self.pipeline.job_concurrency {
            return Err(anyhow!(
                "Global concurrency ({}) must not be lower than per-job concurrency ({})",
                self.pipeline.global_concurrency,
                self.pipeline.job_concurrency
            ));
        }
        Ok(())
    }
}
