//! The log sink collaborator.
//!
//! The dispatch core never formats output itself. It only reports
//! `(source, severity, message, error)` tuples to a [`LogSink`]; the runtime
//! crate provides a `tracing`-backed sink and [`RecordingSink`] keeps
//! entries in memory.

use std::error::Error as StdError;
use std::str::FromStr;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Trace,
    Debug,
    #[serde(alias = "info")]
    Information,
    #[serde(alias = "warn")]
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 6] = [
        Severity::Trace,
        Severity::Debug,
        Severity::Information,
        Severity::Warning,
        Severity::Error,
        Severity::Critical,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Trace => "Trace",
            Severity::Debug => "Debug",
            Severity::Information => "Information",
            Severity::Warning => "Warning",
            Severity::Error => "Error",
            Severity::Critical => "Critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Severity::Trace),
            "debug" => Ok(Severity::Debug),
            "info" | "information" => Ok(Severity::Information),
            "warn" | "warning" => Ok(Severity::Warning),
            "error" => Ok(Severity::Error),
            "critical" => Ok(Severity::Critical),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

/// Destination for log entries produced by the dispatch core.
///
/// Sinks are called concurrently from many dispatch and scheduler tasks and
/// must serialize access to any shared output themselves.
pub trait LogSink: Send + Sync {
    fn log(
        &self,
        source: &str,
        severity: Severity,
        message: &str,
        error: Option<&(dyn StdError + 'static)>,
    );
}

/// Renders an error and its `source()` chain as `outer: inner: root`.
pub fn render_error_chain(error: &(dyn StdError + 'static)) -> String {
    let mut rendered = error.to_string();
    let mut current = error.source();
    while let Some(cause) = current {
        let cause_text = cause.to_string();
        // thiserror-style messages often already embed their source
        if !rendered.ends_with(&cause_text) {
            rendered.push_str(": ");
            rendered.push_str(&cause_text);
        }
        current = cause.source();
    }
    rendered
}

/// One entry captured by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub source: String,
    pub severity: Severity,
    pub message: String,
    /// The attached error rendered with [`render_error_chain`].
    pub error: Option<String>,
}

/// A sink that keeps every entry in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    entries: Mutex<Vec<LogEntry>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all entries logged so far.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    /// Entries at exactly `severity`.
    pub fn at(&self, severity: Severity) -> Vec<LogEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.severity == severity)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl LogSink for RecordingSink {
    fn log(
        &self,
        source: &str,
        severity: Severity,
        message: &str,
        error: Option<&(dyn StdError + 'static)>,
    ) {
        self.entries.lock().push(LogEntry {
            source: source.to_string(),
            severity,
            message: message.to_string(),
            error: error.map(render_error_chain),
        });
    }
}
