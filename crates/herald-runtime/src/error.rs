//! Runtime error types.

use herald_core::{BoxError, ServiceError};
use herald_framework::StartupError;
use thiserror::Error;

use crate::config::ConfigError;

pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Everything that can stop [`HeraldRuntime::run`](crate::HeraldRuntime::run).
///
/// Handler and scheduled-task failures never show up here; they are only
/// logged.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("failed to initialize service {service}")]
    Initialization {
        service: &'static str,
        #[source]
        source: BoxError,
    },

    #[error("gateway client failed")]
    Gateway(#[source] BoxError),
}

impl From<StartupError> for RuntimeError {
    fn from(err: StartupError) -> Self {
        match err {
            StartupError::Service(err) => RuntimeError::Service(err),
            StartupError::Initialization(err) => RuntimeError::Initialization {
                service: err.service,
                source: err.source,
            },
        }
    }
}
