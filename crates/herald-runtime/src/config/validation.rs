//! Configuration validation.

use regex::Regex;

use super::error::{ConfigError, ConfigResult};
use super::schema::{HeraldConfig, LogOutput, LoggingConfig, RuntimeConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &HeraldConfig) -> ConfigResult<()> {
    validate_runtime_config(&config.runtime)?;
    validate_logging_config(&config.logging)?;
    Ok(())
}

fn validate_runtime_config(runtime: &RuntimeConfig) -> ConfigResult<()> {
    if let Some(root) = &runtime.module_discovery {
        if root.trim().is_empty() {
            return Err(ConfigError::validation(
                "runtime.module_discovery must not be empty; omit it to discover everything",
            ));
        }
        if root.split("::").any(|segment| segment.is_empty()) {
            return Err(ConfigError::validation(format!(
                "runtime.module_discovery '{root}' is not a module path"
            )));
        }
    }
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_prefix.trim().is_empty() {
        return Err(ConfigError::validation(
            "logging.file_prefix must not be empty when output = \"file\"",
        ));
    }
    if let Some(pattern) = &logging.sink.message_filter {
        compile_filter(pattern)?;
    }
    Ok(())
}

/// Compiles `logging.sink.message_filter`.
pub(crate) fn compile_filter(pattern: &str) -> ConfigResult<Regex> {
    Regex::new(pattern).map_err(|source| ConfigError::InvalidFilter {
        pattern: pattern.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&HeraldConfig::default()).is_ok());
    }

    #[test]
    fn test_validate_module_discovery() {
        let mut config = HeraldConfig::default();
        config.runtime.module_discovery = Some("my_bot::services".into());
        assert!(validate_config(&config).is_ok());

        config.runtime.module_discovery = Some("   ".into());
        assert!(validate_config(&config).is_err());

        config.runtime.module_discovery = Some("my_bot::".into());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_message_filter() {
        let mut config = HeraldConfig::default();
        config.logging.sink.message_filter = Some("^heartbeat".into());
        assert!(validate_config(&config).is_ok());

        config.logging.sink.message_filter = Some("[".into());
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::InvalidFilter { .. })
        ));
    }

    #[test]
    fn test_validate_file_output() {
        let mut config = HeraldConfig::default();
        config.logging.output = LogOutput::File;
        config.logging.file_prefix = String::new();
        assert!(validate_config(&config).is_err());
    }
}
