//! Configuration schema definitions.

use std::collections::BTreeMap;
use std::path::PathBuf;

use herald_core::Severity;
use herald_framework::DispatchMode;
use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeraldConfig {
    /// Lifecycle and dispatch settings.
    #[serde(default)]
    pub runtime: RuntimeConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

// =============================================================================
// Runtime
// =============================================================================

/// Lifecycle and dispatch settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Run handlers inline on the gateway's dispatch path (`true`) or on a
    /// detached task per event (`false`).
    #[serde(default = "default_true")]
    pub run_handlers_on_gateway_thread: bool,

    /// Module path to limit service discovery to, e.g. `my_bot::services`.
    /// Unset discovers every registered service in the binary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module_discovery: Option<String>,

    /// Whether link-time discovery runs at all. When disabled only the
    /// programmatically supplied services are used.
    #[serde(default = "default_true")]
    pub discover_services: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            run_handlers_on_gateway_thread: true,
            module_discovery: None,
            discover_services: true,
        }
    }
}

impl RuntimeConfig {
    pub fn dispatch_mode(&self) -> DispatchMode {
        DispatchMode::from_gateway_thread(self.run_handlers_on_gateway_thread)
    }
}

fn default_true() -> bool {
    true
}

// =============================================================================
// Logging
// =============================================================================

/// Log level for `tracing` output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    #[cfg(feature = "json-log")]
    Json,
}

/// Where log output goes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    /// Daily rolling files under [`LoggingConfig::directory`].
    File,
}

/// Span lifecycle events to log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Directory for [`LogOutput::File`].
    #[serde(default = "default_directory")]
    pub directory: PathBuf,

    /// File name prefix for [`LogOutput::File`]; the date is appended.
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    /// Colour console output.
    #[serde(default = "default_true")]
    pub ansi: bool,

    #[serde(default)]
    pub thread_ids: bool,

    /// Include source file and line.
    #[serde(default)]
    pub file_location: bool,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    /// Per-target levels, e.g. `herald_runtime = "debug"`.
    #[serde(default)]
    pub filters: BTreeMap<String, LogLevel>,

    /// Settings of the log sink handed to the dispatch core.
    #[serde(default)]
    pub sink: SinkConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            directory: default_directory(),
            file_prefix: default_file_prefix(),
            ansi: true,
            thread_ids: false,
            file_location: false,
            span_events: SpanEventConfig::default(),
            filters: BTreeMap::new(),
            sink: SinkConfig::default(),
        }
    }
}

fn default_directory() -> PathBuf {
    PathBuf::from("logs")
}

fn default_file_prefix() -> String {
    "herald.log".to_string()
}

/// Settings of [`TracingSink`](crate::logging::TracingSink).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Severities that are dropped entirely.
    #[serde(default)]
    pub disabled_severities: Vec<Severity>,

    /// Messages matching this regular expression are dropped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_filter: Option<String>,

    /// Emit every line of a multi-line message (including the rendered
    /// error) as its own record.
    #[serde(default = "default_true")]
    pub log_newlines_separately: bool,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            disabled_severities: Vec::new(),
            message_filter: None,
            log_newlines_separately: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HeraldConfig::default();
        assert!(config.runtime.run_handlers_on_gateway_thread);
        assert!(config.runtime.discover_services);
        assert_eq!(config.runtime.module_discovery, None);
        assert_eq!(config.runtime.dispatch_mode(), DispatchMode::Inline);
        assert_eq!(config.logging.level, LogLevel::Info);
        assert!(config.logging.sink.log_newlines_separately);
    }

    #[test]
    fn test_offloaded_dispatch_mode() {
        let runtime = RuntimeConfig {
            run_handlers_on_gateway_thread: false,
            ..Default::default()
        };
        assert_eq!(runtime.dispatch_mode(), DispatchMode::Offloaded);
    }
}
