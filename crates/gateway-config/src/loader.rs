//! Configuration loading from files and environment.
//!
//! Sources are layered in order: each one is parsed into a generic document
//! and deep-merged over the previous ones, so a later file only needs the
//! keys it changes. `${VAR}` and `${VAR:-default}` references are expanded
//! before parsing, and `<PREFIX>_*` variables are applied last.

use crate::schema::GatewayConfig;
use gateway_masking::MaskError;
use gateway_telemetry::LoggingError;
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, info, warn};

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File not found
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// The path to the file that was not found
        path: String,
    },

    /// IO error
    #[error("IO error reading configuration: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON parsing error, also raised when the merged document does not fit
    /// the schema
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Validation error
    #[error("Configuration validation error: {0}")]
    Validation(String),

    /// Masking rules do not compile
    #[error("Invalid masking rules: {0}")]
    Masking(#[from] MaskError),

    /// Logging section is invalid
    #[error("Invalid logging configuration: {0}")]
    Logging(#[from] LoggingError),

    /// Unsupported format
    #[error("Unsupported configuration format: {extension}")]
    UnsupportedFormat {
        /// The file extension that was not supported
        extension: String,
    },

    /// Referenced environment variable is unset and has no default
    #[error("Environment variable not found: {name}")]
    EnvVarNotFound {
        /// The name of the environment variable that was not found
        name: String,
    },

    /// Override variable holds an unusable value
    #[error("Invalid value {value:?} in environment variable {name}")]
    InvalidEnvValue {
        /// Variable name
        name: String,
        /// Offending value
        value: String,
    },
}

/// Configuration source
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// File path; the format follows the extension
    File(String),
    /// Raw YAML string
    Yaml(String),
    /// Raw TOML string
    Toml(String),
    /// Raw JSON string
    Json(String),
}

/// Configuration loader
#[derive(Debug, Default)]
pub struct ConfigLoader {
    sources: Vec<ConfigSource>,
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// Create a new config loader
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a configuration source
    #[must_use]
    pub fn with_source(mut self, source: ConfigSource) -> Self {
        self.sources.push(source);
        self
    }

    /// Add a file source
    #[must_use]
    pub fn with_file(self, path: impl Into<String>) -> Self {
        self.with_source(ConfigSource::File(path.into()))
    }

    /// Set environment variable prefix for overrides
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Load configuration from all sources.
    ///
    /// Besides schema validation this compiles the masking rules and checks
    /// the logging section, so a returned configuration cannot fail later
    /// when the gateway is assembled.
    ///
    /// # Errors
    /// Returns error if any source fails to load or the result is invalid
    pub async fn load(self) -> Result<GatewayConfig, ConfigError> {
        let mut document = Value::Object(Map::new());
        for source in &self.sources {
            let layer = Self::load_source(source).await?;
            merge(&mut document, layer);
        }

        let mut config: GatewayConfig = serde_json::from_value(document)?;

        if let Some(prefix) = &self.env_prefix {
            apply_env_overrides(&mut config, prefix)?;
        }

        config
            .validate_config()
            .map_err(|e| ConfigError::Validation(e.to_string()))?;
        config.logging.validate()?;
        let masker = config.masker()?;

        info!(
            sources = self.sources.len(),
            masks = masker.len(),
            remote_cache = config.cache.remote.is_some(),
            "Configuration loaded successfully"
        );
        Ok(config)
    }

    async fn load_source(source: &ConfigSource) -> Result<Value, ConfigError> {
        match source {
            ConfigSource::File(path) => Self::load_file(path).await,
            ConfigSource::Yaml(content) => parse_yaml(&substitute_env_vars(content)?),
            ConfigSource::Toml(content) => parse_toml(&substitute_env_vars(content)?),
            ConfigSource::Json(content) => parse_json(&substitute_env_vars(content)?),
        }
    }

    async fn load_file(path: &str) -> Result<Value, ConfigError> {
        let path = Path::new(path);

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            });
        }

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        let content = fs::read_to_string(path).await?;
        let content = substitute_env_vars(&content)?;

        debug!(path = %path.display(), format = %extension, "Loading configuration file");

        match extension.as_str() {
            "yaml" | "yml" => parse_yaml(&content),
            "toml" => parse_toml(&content),
            "json" => parse_json(&content),
            ext => Err(ConfigError::UnsupportedFormat {
                extension: ext.to_string(),
            }),
        }
    }
}

fn parse_yaml(content: &str) -> Result<Value, ConfigError> {
    // an empty YAML document parses as null
    match serde_yaml::from_str::<Value>(content)? {
        Value::Null => Ok(Value::Object(Map::new())),
        value => Ok(value),
    }
}

fn parse_toml(content: &str) -> Result<Value, ConfigError> {
    Ok(toml::from_str(content)?)
}

fn parse_json(content: &str) -> Result<Value, ConfigError> {
    Ok(serde_json::from_str(content)?)
}

/// Merge `overlay` into `base`: objects key by key, anything else replaced
fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[allow(clippy::expect_used)]
fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").expect("valid regex"))
}

/// Expand `${VAR}` and `${VAR:-default}` references
fn substitute_env_vars(content: &str) -> Result<String, ConfigError> {
    let mut missing = None;
    let expanded = env_var_pattern().replace_all(content, |caps: &Captures<'_>| {
        let name = &caps[1];
        match (std::env::var(name), caps.get(2)) {
            (Ok(value), _) => value,
            (Err(_), Some(default)) => default.as_str().to_string(),
            (Err(_), None) => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });

    match missing {
        Some(name) => Err(ConfigError::EnvVarNotFound { name }),
        None => Ok(expanded.into_owned()),
    }
}

/// Apply `<PREFIX>_*` environment overrides
fn apply_env_overrides(config: &mut GatewayConfig, prefix: &str) -> Result<(), ConfigError> {
    if let Ok(level) = std::env::var(format!("{prefix}_LOG_LEVEL")) {
        debug!(level = %level, "Log level overridden from environment");
        config.logging.level = level;
    }

    if let Ok(format) = std::env::var(format!("{prefix}_LOG_FORMAT")) {
        config.logging.format = format.parse()?;
    }

    let name = format!("{prefix}_LIMITER_MAX_TOKENS");
    if let Ok(value) = std::env::var(&name) {
        config.limiter.max_tokens = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidEnvValue { name, value })?;
    }

    if let Ok(url) = std::env::var(format!("{prefix}_CACHE_REMOTE_URL")) {
        config.cache.remote.get_or_insert_with(Default::default).url = url;
    }

    Ok(())
}

/// Load configuration from default locations
///
/// Looks for configuration in order:
/// 1. Path from `LOGQ_CONFIG` environment variable
/// 2. ./config.yaml, ./config.yml
/// 3. ./config/default.yaml, ./config/default.yml
/// 4. /etc/logq-gateway/config.yaml
///
/// Environment overrides use the `LOGQ` prefix.
///
/// # Errors
/// Returns error if a configuration is found but fails to load
pub async fn load_config() -> Result<GatewayConfig, ConfigError> {
    let explicit = std::env::var("LOGQ_CONFIG").ok();

    let search_paths: Vec<&str> = match explicit.as_deref() {
        Some(path) => vec![path],
        None => vec![
            "config.yaml",
            "config.yml",
            "config/default.yaml",
            "config/default.yml",
            "/etc/logq-gateway/config.yaml",
        ],
    };

    let loader = ConfigLoader::new().with_env_prefix("LOGQ");
    for path in search_paths {
        if Path::new(path).exists() {
            info!(path, "Loading configuration");
            return loader.with_file(path).load().await;
        }
    }

    warn!("No configuration file found, using defaults");
    loader.load().await
}
