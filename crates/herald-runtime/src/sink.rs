//! The default [`LogSink`]: forwards dispatch-core entries to `tracing`.

use std::collections::HashSet;
use std::error::Error as StdError;

use herald_core::{LogSink, Severity, render_error_chain};
use regex::Regex;

use crate::config::{ConfigResult, SinkConfig};
use crate::config::validation::compile_filter;

/// Forwards log entries to `tracing` events carrying a `source` field.
///
/// `Critical` has no `tracing` level of its own and is emitted at `ERROR`
/// with `critical = true`.
#[derive(Debug, Clone)]
pub struct TracingSink {
    disabled: HashSet<Severity>,
    message_filter: Option<Regex>,
    log_newlines_separately: bool,
}

impl Default for TracingSink {
    fn default() -> Self {
        Self::new()
    }
}

impl TracingSink {
    pub fn new() -> Self {
        Self {
            disabled: HashSet::new(),
            message_filter: None,
            log_newlines_separately: true,
        }
    }

    pub fn from_config(config: &SinkConfig) -> ConfigResult<Self> {
        let mut sink = Self::new().log_newlines_separately(config.log_newlines_separately);
        for severity in &config.disabled_severities {
            sink = sink.disable(*severity);
        }
        if let Some(pattern) = &config.message_filter {
            sink.message_filter = Some(compile_filter(pattern)?);
        }
        Ok(sink)
    }

    /// Drop every entry at `severity`.
    pub fn disable(mut self, severity: Severity) -> Self {
        self.disabled.insert(severity);
        self
    }

    /// Drop every entry whose message matches `filter`.
    pub fn message_filter(mut self, filter: Regex) -> Self {
        self.message_filter = Some(filter);
        self
    }

    pub fn log_newlines_separately(mut self, enabled: bool) -> Self {
        self.log_newlines_separately = enabled;
        self
    }

    pub fn is_enabled(&self, severity: Severity) -> bool {
        !self.disabled.contains(&severity)
    }

    /// The records this sink would emit for one entry, in order.
    ///
    /// Each record is a message plus the rendered error, if it was not
    /// folded into the message lines.
    pub fn render(
        &self,
        severity: Severity,
        message: &str,
        error: Option<&(dyn StdError + 'static)>,
    ) -> Vec<(String, Option<String>)> {
        if message.trim().is_empty() {
            return Vec::new();
        }
        if let Some(filter) = &self.message_filter
            && filter.is_match(message)
        {
            return Vec::new();
        }
        if !self.is_enabled(severity) {
            return Vec::new();
        }

        let error = error.map(render_error_chain);
        if !self.log_newlines_separately {
            return vec![(message.to_string(), error)];
        }

        let mut text = message.to_string();
        if let Some(error) = error {
            text.push('\n');
            text.push_str(&error);
        }
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| (line.to_string(), None))
            .collect()
    }
}

impl LogSink for TracingSink {
    fn log(
        &self,
        source: &str,
        severity: Severity,
        message: &str,
        error: Option<&(dyn StdError + 'static)>,
    ) {
        for (line, error) in self.render(severity, message, error) {
            emit(source, severity, &line, error.as_deref());
        }
    }
}

fn emit(source: &str, severity: Severity, message: &str, error: Option<&str>) {
    match severity {
        Severity::Trace => tracing::trace!(source, error, "{message}"),
        Severity::Debug => tracing::debug!(source, error, "{message}"),
        Severity::Information => tracing::info!(source, error, "{message}"),
        Severity::Warning => tracing::warn!(source, error, "{message}"),
        Severity::Error => tracing::error!(source, error, "{message}"),
        Severity::Critical => tracing::error!(source, error, critical = true, "{message}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::ServiceError;

    fn lines(records: Vec<(String, Option<String>)>) -> Vec<String> {
        records.into_iter().map(|(line, _)| line).collect()
    }

    #[test]
    fn test_blank_messages_are_dropped() {
        let sink = TracingSink::new();
        assert!(sink.render(Severity::Information, "  \n ", None).is_empty());
    }

    #[test]
    fn test_newlines_are_split_with_error_chain() {
        let sink = TracingSink::new();
        let err = ServiceError::Construction {
            type_name: "Db",
            source: "refused".into(),
        };
        let records = sink.render(Severity::Error, "first\n\nsecond", Some(&err));
        assert_eq!(
            lines(records),
            ["first", "second", "failed to construct service 'Db': refused"]
        );
    }

    #[test]
    fn test_unsplit_keeps_error_field() {
        let sink = TracingSink::new().log_newlines_separately(false);
        let err = std::io::Error::other("boom");
        let records = sink.render(Severity::Warning, "a\nb", Some(&err));
        assert_eq!(records, [("a\nb".to_string(), Some("boom".to_string()))]);
    }

    #[test]
    fn test_disabled_severity_and_filter() {
        let config = SinkConfig {
            disabled_severities: vec![Severity::Trace],
            message_filter: Some("heartbeat".into()),
            log_newlines_separately: true,
        };
        let sink = TracingSink::from_config(&config).unwrap();
        assert!(!sink.is_enabled(Severity::Trace));
        assert!(sink.render(Severity::Trace, "tick", None).is_empty());
        assert!(sink.render(Severity::Information, "heartbeat ack", None).is_empty());
        assert_eq!(lines(sink.render(Severity::Information, "ready", None)), ["ready"]);
    }

    #[test]
    fn test_invalid_filter_is_rejected() {
        let config = SinkConfig {
            message_filter: Some("(".into()),
            ..Default::default()
        };
        assert!(TracingSink::from_config(&config).is_err());
    }

    #[test]
    fn test_log_does_not_panic_without_subscriber() {
        let sink = TracingSink::new();
        sink.log("Herald", Severity::Critical, "shutting down", None);
    }
}
