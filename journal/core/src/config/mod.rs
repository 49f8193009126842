//! Reflection Configuration
//!
//! Backend selection, endpoints, models, prompts and the HTTP connect timeout
//! for reflection requests, loaded from `~/.config/journal/reflection.toml`.
//!
//! # Configuration Priority
//!
//! Highest priority first:
//! 1. CLI arguments (via [`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! The OpenAI API key is never read from the file.
//!
//! # Example Configuration
//!
//! ```toml
//! [backend]
//! mode = "local"
//!
//! [remote]
//! endpoint = "https://api.openai.com/v1/chat/completions"
//! model = "gpt-4o"
//!
//! [local]
//! endpoint = "http://localhost:11434/api/chat"
//! model = "llama3.2"
//!
//! [http]
//! connect_timeout_ms = 10000
//!
//! [prompts]
//! reflection = "Talk it through with me like a friend."
//! ```

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::request::{
    Backend, RequestBuilder, DEFAULT_LOCAL_ENDPOINT, DEFAULT_REMOTE_ENDPOINT,
    DEFAULT_REMOTE_MODEL,
};
use crate::transport::http::DEFAULT_CONNECT_TIMEOUT;

/// Backend mode
pub const ENV_MODE: &str = "JOURNAL_LLM_MODE";
/// Remote model
pub const ENV_REMOTE_MODEL: &str = "JOURNAL_REMOTE_MODEL";
/// Remote endpoint
pub const ENV_REMOTE_ENDPOINT: &str = "JOURNAL_REMOTE_ENDPOINT";
/// Ollama model
pub const ENV_OLLAMA_MODEL: &str = "JOURNAL_OLLAMA_MODEL";
/// Ollama endpoint
pub const ENV_OLLAMA_ENDPOINT: &str = "JOURNAL_OLLAMA_ENDPOINT";
/// Connect timeout in milliseconds
pub const ENV_CONNECT_TIMEOUT_MS: &str = "JOURNAL_CONNECT_TIMEOUT_MS";

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

/// Which backend reflections go to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    /// OpenAI chat completions
    #[default]
    Remote,
    /// Local Ollama server
    Local,
}

impl FromStr for BackendMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "remote" => Ok(Self::Remote),
            "local" => Ok(Self::Local),
            other => Err(ConfigError::ValidationError(format!(
                "unknown backend mode '{other}' (expected 'remote' or 'local')"
            ))),
        }
    }
}

impl std::fmt::Display for BackendMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Remote => write!(f, "remote"),
            Self::Local => write!(f, "local"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// Backend section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendToml {
    /// `remote` or `local`
    pub mode: Option<String>,
}

/// Remote or local endpoint section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointToml {
    /// Chat endpoint URL
    pub endpoint: Option<String>,

    /// Model identifier
    pub model: Option<String>,
}

/// HTTP section of the TOML configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpToml {
    /// Connection timeout in milliseconds
    pub connect_timeout_ms: Option<u64>,
}

/// Prompt overrides
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsToml {
    /// System prompt for reflections and follow-ups
    pub reflection: Option<String>,

    /// System prompt for questions
    pub question: Option<String>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflectionToml {
    /// Backend selection
    pub backend: BackendToml,

    /// OpenAI-compatible backend
    pub remote: EndpointToml,

    /// Ollama backend
    pub local: EndpointToml,

    /// HTTP client settings
    pub http: HttpToml,

    /// Prompt overrides
    pub prompts: PromptsToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Resolved reflection configuration
///
/// Use [`load_config`] to load configuration with proper priority handling.
#[derive(Clone, Debug)]
pub struct ReflectionConfig {
    /// Active backend
    pub mode: BackendMode,

    /// Chat-completions endpoint
    pub remote_endpoint: String,

    /// Remote model
    pub remote_model: String,

    /// Ollama chat endpoint
    pub local_endpoint: String,

    /// Ollama model; unset until the user picks one
    pub local_model: Option<String>,

    /// HTTP connect timeout
    pub connect_timeout: Duration,

    /// Reflection prompt override
    pub reflection_prompt: Option<String>,

    /// Question prompt override
    pub question_prompt: Option<String>,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    /// Source of configuration values
    source: ConfigSource,
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        Self {
            mode: BackendMode::default(),
            remote_endpoint: DEFAULT_REMOTE_ENDPOINT.to_string(),
            remote_model: DEFAULT_REMOTE_MODEL.to_string(),
            local_endpoint: DEFAULT_LOCAL_ENDPOINT.to_string(),
            local_model: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reflection_prompt: None,
            question_prompt: None,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl ReflectionConfig {
    /// Create a new configuration with default values
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Backend for the active mode
    ///
    /// A missing API key is not rejected here; the request builder reports
    /// it as a configuration error when a session starts.
    #[must_use]
    pub fn backend(&self, api_key: Option<&str>) -> Backend {
        match self.mode {
            BackendMode::Remote => Backend::Remote {
                api_key: api_key.unwrap_or_default().to_string(),
                model: self.remote_model.clone(),
            },
            BackendMode::Local => Backend::Local {
                model: self.local_model.clone(),
            },
        }
    }

    /// Request builder using the configured endpoints and prompts
    #[must_use]
    pub fn request_builder(&self) -> RequestBuilder {
        let mut builder = RequestBuilder::new()
            .with_remote_endpoint(self.remote_endpoint.clone())
            .with_local_endpoint(self.local_endpoint.clone());
        if let Some(prompt) = &self.reflection_prompt {
            builder = builder.with_reflection_prompt(prompt.clone());
        }
        if let Some(prompt) = &self.question_prompt {
            builder = builder.with_question_prompt(prompt.clone());
        }
        builder
    }

    /// Check values that would only fail later, at request time
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] for an empty endpoint or a
    /// zero connect timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.remote_endpoint.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "remote endpoint must not be empty".to_string(),
            ));
        }
        if self.local_endpoint.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "local endpoint must not be empty".to_string(),
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::ValidationError(
                "connect_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/journal/reflection.toml` or
/// `~/.config/journal/reflection.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("journal").join("reflection.toml"))
}

/// Load configuration from all sources with proper priority
///
/// CLI overrides are not handled here; apply [`ConfigOverrides`] afterwards.
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed, or if
/// the result fails validation. A missing config file is not an error.
pub fn load_config() -> Result<ReflectionConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration, reading the file at `path` if it exists
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed, or
/// if the result fails validation.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<ReflectionConfig, ConfigError> {
    load_config_with_env(path, |key| std::env::var(key).ok())
}

/// Load configuration using `env` to look up environment variables
///
/// # Errors
///
/// Same as [`load_config_from_path`].
pub fn load_config_with_env(
    path: Option<PathBuf>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ReflectionConfig, ConfigError> {
    let mut config = ReflectionConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: ReflectionToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config)?;
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, env);
    config.validate()?;

    Ok(config)
}

fn apply_toml_config(config: &mut ReflectionConfig, toml: &ReflectionToml) -> Result<(), ConfigError> {
    if let Some(ref mode) = toml.backend.mode {
        config.mode = mode.parse()?;
    }

    if let Some(ref endpoint) = toml.remote.endpoint {
        config.remote_endpoint = endpoint.clone();
    }
    if let Some(ref model) = toml.remote.model {
        config.remote_model = model.clone();
    }
    if let Some(ref endpoint) = toml.local.endpoint {
        config.local_endpoint = endpoint.clone();
    }
    if toml.local.model.is_some() {
        config.local_model = toml.local.model.clone();
    }

    if let Some(timeout) = toml.http.connect_timeout_ms {
        config.connect_timeout = Duration::from_millis(timeout);
    }

    if toml.prompts.reflection.is_some() {
        config.reflection_prompt = toml.prompts.reflection.clone();
    }
    if toml.prompts.question.is_some() {
        config.question_prompt = toml.prompts.question.clone();
    }

    Ok(())
}

fn apply_env_config(config: &mut ReflectionConfig, env: impl Fn(&str) -> Option<String>) {
    if let Some(mode) = env(ENV_MODE) {
        match mode.parse() {
            Ok(mode) => {
                config.mode = mode;
                config.source = ConfigSource::Env;
            }
            Err(e) => tracing::warn!(var = ENV_MODE, error = %e, "Ignoring environment override"),
        }
    }
    if let Some(model) = env(ENV_REMOTE_MODEL) {
        config.remote_model = model;
        config.source = ConfigSource::Env;
    }
    if let Some(endpoint) = env(ENV_REMOTE_ENDPOINT) {
        config.remote_endpoint = endpoint;
        config.source = ConfigSource::Env;
    }
    if let Some(model) = env(ENV_OLLAMA_MODEL) {
        config.local_model = Some(model);
        config.source = ConfigSource::Env;
    }
    if let Some(endpoint) = env(ENV_OLLAMA_ENDPOINT) {
        config.local_endpoint = endpoint;
        config.source = ConfigSource::Env;
    }
    if let Some(timeout) = env(ENV_CONNECT_TIMEOUT_MS) {
        if let Ok(ms) = timeout.parse::<u64>() {
            config.connect_timeout = Duration::from_millis(ms);
            config.source = ConfigSource::Env;
        }
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Command-line overrides, the last configuration layer
///
/// Applied after [`load_config`].
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Backend mode override
    pub mode: Option<BackendMode>,

    /// Model override for the active backend
    pub model: Option<String>,

    /// Connect timeout override (milliseconds)
    pub connect_timeout_ms: Option<u64>,
}

impl ConfigOverrides {
    /// No overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set backend mode override
    #[must_use]
    pub fn with_mode(mut self, mode: BackendMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Set model override
    #[must_use]
    pub fn with_model(mut self, model: String) -> Self {
        self.model = Some(model);
        self
    }

    /// Override the connect timeout
    #[must_use]
    pub fn with_connect_timeout_ms(mut self, ms: u64) -> Self {
        self.connect_timeout_ms = Some(ms);
        self
    }

    /// Apply overrides to a configuration
    ///
    /// The model override applies to whichever backend is active after the
    /// mode override.
    pub fn apply(&self, config: &mut ReflectionConfig) {
        if self.mode.is_some() || self.model.is_some() || self.connect_timeout_ms.is_some() {
            config.source = ConfigSource::Cli;
        }

        if let Some(mode) = self.mode {
            config.mode = mode;
        }

        if let Some(ref model) = self.model {
            match config.mode {
                BackendMode::Remote => config.remote_model = model.clone(),
                BackendMode::Local => config.local_model = Some(model.clone()),
            }
        }

        if let Some(timeout) = self.connect_timeout_ms {
            config.connect_timeout = Duration::from_millis(timeout);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
