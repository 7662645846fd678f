//! Structured logging setup.
//!
//! Every crate in the gateway logs through `tracing` macros; this module owns
//! the one process-wide subscriber that renders those events.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Install a subscriber at all
    pub enabled: bool,
    /// Default level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format
    pub format: LogFormat,
    /// Prefix lines with timestamps; JSON output always carries them
    pub timestamps: bool,
    /// Include file and line
    pub include_location: bool,
    /// Span lifecycle events to log
    pub span_events: SpanEvents,
    /// Extra directives, e.g. `gateway_cache=debug,redis=warn`
    pub filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: "info".to_string(),
            format: LogFormat::Json,
            timestamps: true,
            include_location: false,
            span_events: SpanEvents::None,
            filter: None,
        }
    }
}

impl LoggingConfig {
    /// Set the level
    #[must_use]
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    /// Set the output format
    #[must_use]
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set extra filter directives
    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Parsed default level
    ///
    /// # Errors
    /// Returns `LoggingError::InvalidLevel` for unknown level names
    pub fn tracing_level(&self) -> Result<Level, LoggingError> {
        match self.level.to_ascii_lowercase().as_str() {
            "warning" => Ok(Level::WARN),
            other => Level::from_str(other).map_err(|_| LoggingError::InvalidLevel {
                level: self.level.clone(),
            }),
        }
    }

    /// Filter directives derived from the level and extra directives
    ///
    /// # Errors
    /// Returns an error if the level is unknown
    pub fn directives(&self) -> Result<String, LoggingError> {
        let level = self.tracing_level()?.as_str().to_ascii_lowercase();
        Ok(match self.filter.as_deref().map(str::trim) {
            Some(extra) if !extra.is_empty() => format!("{level},{extra}"),
            _ => level,
        })
    }

    /// Check the level and filter directives without installing anything
    ///
    /// # Errors
    /// Returns the first problem found
    pub fn validate(&self) -> Result<(), LoggingError> {
        let directives = self.directives()?;
        EnvFilter::try_new(&directives)
            .map(|_| ())
            .map_err(|e| LoggingError::FilterParse(e.to_string()))
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per event
    #[default]
    Json,
    /// Multi-line, human-readable
    Pretty,
    /// Single-line, human-readable
    Compact,
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            _ => Err(LoggingError::InvalidFormat {
                format: s.to_string(),
            }),
        }
    }
}

/// Span lifecycle events to log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpanEvents {
    /// None
    #[default]
    None,
    /// Span entered
    Enter,
    /// Span exited
    Exit,
    /// Entered and exited
    Full,
    /// Created and closed
    Lifecycle,
}

impl SpanEvents {
    fn to_fmt_span(self) -> FmtSpan {
        match self {
            Self::None => FmtSpan::NONE,
            Self::Enter => FmtSpan::ENTER,
            Self::Exit => FmtSpan::EXIT,
            Self::Full => FmtSpan::ENTER | FmtSpan::EXIT,
            Self::Lifecycle => FmtSpan::NEW | FmtSpan::CLOSE,
        }
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG`, when set, replaces the configured directives.
///
/// # Errors
/// Returns an error if the configuration is invalid or a subscriber is
/// already installed
pub fn init_logging(config: &LoggingConfig) -> Result<(), LoggingError> {
    if !config.enabled {
        return Ok(());
    }

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(config.directives()?)
            .map_err(|e| LoggingError::FilterParse(e.to_string()))?,
    };

    tracing_subscriber::registry()
        .with(format_layer(config).with_filter(filter))
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))
}

fn format_layer(config: &LoggingConfig) -> Box<dyn Layer<Registry> + Send + Sync> {
    let base = fmt::layer()
        .with_span_events(config.span_events.to_fmt_span())
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_target(true);

    match (config.format, config.timestamps) {
        (LogFormat::Json, _) => base.json().with_thread_ids(true).boxed(),
        (LogFormat::Pretty, true) => base.pretty().boxed(),
        (LogFormat::Pretty, false) => base.pretty().without_time().boxed(),
        (LogFormat::Compact, true) => base.compact().boxed(),
        (LogFormat::Compact, false) => base.compact().without_time().boxed(),
    }
}

/// Logging setup errors
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// A subscriber could not be installed
    #[error("Failed to initialize logging: {0}")]
    Init(String),
    /// Filter directives did not parse
    #[error("Failed to parse log filter: {0}")]
    FilterParse(String),
    /// Unknown level name
    #[error("Unknown log level: {level}")]
    InvalidLevel {
        /// Offending level
        level: String,
    },
    /// Unknown format name
    #[error("Unknown log format: {format}")]
    InvalidFormat {
        /// Offending format
        format: String,
    },
}
