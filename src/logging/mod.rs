//! Structured logging for dockgroup
//!
//! Logs go to stderr (or a file) so stdout stays free for scenario output
//! and JSON event lines.

use crate::{DockGroupError, Result};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;
use tracing_subscriber::{
    fmt::{self, time::UtcTime, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer, Registry,
};

/// Directive variable that replaces the computed filter entirely
pub const LOG_FILTER_ENV: &str = "DOCKGROUP_LOG";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// How and where dockgroup logs
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum level for the `dockgroup` target
    pub level: LogLevel,
    /// Line format (pretty, compact, json)
    pub format: LogFormat,
    /// Destination (stderr, file, both)
    pub output: LogOutput,
    /// Required for [`LogOutput::File`] and [`LogOutput::Both`]
    pub file_path: Option<PathBuf>,
    /// Include source file and line numbers
    pub include_source: bool,
    /// Emit the per-computation timings of [`trace_performance!`](crate::trace_performance)
    pub performance_tracing: bool,
}

/// Log levels, named in lowercase by `DOCKGROUP_LOG_LEVEL`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Name used in filter directives
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("Invalid log level: {}", s)),
        }
    }
}

/// Log line formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line human-readable output for development
    Pretty,
    /// One short line per event
    Compact,
    /// One JSON object per line, for log aggregation
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: {}", s)),
        }
    }
}

/// Log destinations; stdout is never used since it carries scenario output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    /// Standard error
    Stderr,
    /// Append to [`LogConfig::file_path`]
    File,
    /// Standard error and the log file
    Both,
}

impl FromStr for LogOutput {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stderr" => Ok(LogOutput::Stderr),
            "file" => Ok(LogOutput::File),
            "both" => Ok(LogOutput::Both),
            _ => Err(format!("Invalid log output: {}", s)),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Warn,
            format: LogFormat::Compact,
            output: LogOutput::Stderr,
            file_path: None,
            include_source: false,
            performance_tracing: false,
        }
    }
}

impl LogConfig {
    /// Verbose human-readable logging with timings
    pub fn development() -> Self {
        Self {
            level: LogLevel::Debug,
            format: LogFormat::Pretty,
            include_source: true,
            performance_tracing: true,
            ..Self::default()
        }
    }

    /// JSON logs appended to [`LogConfig::default_log_path`]
    pub fn host() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Json,
            output: LogOutput::File,
            file_path: Some(Self::default_log_path()),
            ..Self::default()
        }
    }

    /// `~/.config/dockgroup/dockgroup.log`
    pub fn default_log_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("dockgroup")
            .join("dockgroup.log")
    }

    /// Defaults overridden by `DOCKGROUP_LOG_*` variables; unparsable values are ignored
    pub fn from_env() -> Self {
        Self::default().apply_env(|key| std::env::var(key).ok())
    }

    fn apply_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("DOCKGROUP_LOG_LEVEL").and_then(|v| v.parse().ok()) {
            self.level = level;
        }
        if let Some(format) = lookup("DOCKGROUP_LOG_FORMAT").and_then(|v| v.parse().ok()) {
            self.format = format;
        }
        if let Some(output) = lookup("DOCKGROUP_LOG_OUTPUT").and_then(|v| v.parse().ok()) {
            self.output = output;
        }
        if let Some(path) = lookup("DOCKGROUP_LOG_FILE") {
            self.file_path = Some(PathBuf::from(path));
        }
        if let Some(source) = lookup("DOCKGROUP_LOG_SOURCE") {
            self.include_source = source.eq_ignore_ascii_case("true");
        }
        if let Some(performance) = lookup("DOCKGROUP_LOG_PERFORMANCE") {
            self.performance_tracing = performance.eq_ignore_ascii_case("true");
        }
        self
    }

    /// Filter directives for this configuration
    pub fn directives(&self) -> String {
        let mut directives = format!("dockgroup={}", self.level.as_str());
        if self.performance_tracing {
            directives.push_str(",dockgroup::services::group_orchestrator=debug");
            directives.push_str(",dockgroup::services::move_propagator=trace");
        }
        directives
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_env(LOG_FILTER_ENV)
            .unwrap_or_else(|_| EnvFilter::new(self.directives()))
    }
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let layers: Vec<BoxedLayer> = match (config.output, config.file_path.as_deref()) {
        (LogOutput::Stderr, _) => vec![format_layer(config, std::io::stderr)],
        (LogOutput::File, Some(path)) => vec![file_layer(config, path)?],
        (LogOutput::Both, Some(path)) => vec![
            format_layer(config, std::io::stderr),
            file_layer(config, path)?,
        ],
        (LogOutput::File, None) | (LogOutput::Both, None) => {
            return Err(DockGroupError::ConfigurationError(
                "File path required for file log output".to_string(),
            )
            .into());
        }
    };

    tracing_subscriber::registry()
        .with(layers.with_filter(config.filter()))
        .try_init()
        .map_err(|err| {
            DockGroupError::ConfigurationError(format!("Failed to initialize logging: {}", err))
        })?;

    debug!(?config, "Logging initialized");
    Ok(())
}

fn file_layer(config: &LogConfig, path: &Path) -> Result<BoxedLayer> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(format_layer(config, std::sync::Mutex::new(file)))
}

fn format_layer<W>(config: &LogConfig, writer: W) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_timer(UtcTime::rfc_3339())
        .with_file(config.include_source)
        .with_line_number(config.include_source);

    match config.format {
        LogFormat::Pretty => Box::new(layer.pretty()),
        LogFormat::Compact => Box::new(layer.compact()),
        LogFormat::Json => Box::new(layer.json()),
    }
}

/// Time a block and report it at debug level, in microseconds
#[macro_export]
macro_rules! trace_performance {
    ($name:expr, $block:block) => {{
        let start = std::time::Instant::now();
        let result = $block;
        tracing::debug!(
            operation = $name,
            duration_us = start.elapsed().as_micros() as u64,
            "Performance trace"
        );
        result
    }};
}
