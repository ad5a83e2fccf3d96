//! Configuration module for the Herald runtime.
//!
//! Configuration is layered with figment (defaults, profile file, main file,
//! `HERALD_*` environment variables, programmatic overrides) and validated
//! before use.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    HeraldConfig, LogFormat, LogLevel, LogOutput, LoggingConfig, RuntimeConfig, SinkConfig,
    SpanEventConfig,
};
pub use validation::validate_config;
