//! Framework error types.

use herald_core::{BoxError, ServiceError};
use thiserror::Error;

/// A handler returned an error or panicked.
///
/// Only ever handed to the log sink; dispatch itself never fails.
#[derive(Debug, Error)]
#[error("handler {service} failed")]
pub struct HandlerFailed {
    /// Short name of the service the handler belongs to.
    pub service: &'static str,
    #[source]
    pub source: BoxError,
}

/// A service initializer failed during startup.
#[derive(Debug, Error)]
#[error("failed to initialize service {service}")]
pub struct InitializationError {
    pub service: &'static str,
    #[source]
    pub source: BoxError,
}

/// Errors from [`initialize_services`](crate::lifecycle::initialize_services).
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Initialization(#[from] InitializationError),
}
