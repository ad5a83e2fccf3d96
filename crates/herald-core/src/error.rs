//! Error types shared across the Herald crates.

use thiserror::Error;

use crate::event::EventKind;

/// Boxed, thread-safe error returned by application code (handlers,
/// initializers, scheduled tasks, service constructors).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised by the service locator.
///
/// These only occur while the process is starting up and are fatal there.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No registration exists for the requested type.
    #[error("service '{type_name}' is not registered")]
    NotRegistered {
        /// Name of the requested type.
        type_name: &'static str,
    },

    /// Constructing the service required the service itself.
    #[error("circular dependency detected while constructing '{type_name}'")]
    CircularDependency {
        /// Name of the type whose construction re-entered itself.
        type_name: &'static str,
    },

    /// The service constructor returned an error.
    #[error("failed to construct service '{type_name}': {source}")]
    Construction {
        /// Name of the type being constructed.
        type_name: &'static str,
        /// Error returned by the constructor.
        #[source]
        source: BoxError,
    },

    /// The stored singleton does not have the type its registration claims.
    #[error("stored instance for '{type_name}' has an unexpected type")]
    TypeMismatch {
        /// Name of the registered type.
        type_name: &'static str,
    },
}

/// A handler received a payload of a different kind than it was bound to.
#[derive(Debug, Clone, Copy, Error)]
#[error("handler expected a {expected} payload but received {found}")]
pub struct PayloadMismatch {
    /// Kind the handler was registered for.
    pub expected: EventKind,
    /// Kind of the event actually delivered.
    pub found: EventKind,
}

/// A handler, gate or scheduled body panicked; the panic was caught.
#[derive(Debug, Clone, Error)]
#[error("panicked: {message}")]
pub struct PanicError {
    /// Panic payload rendered as text, when it was a string.
    pub message: String,
}

impl PanicError {
    /// Builds an error from a payload returned by `catch_unwind`.
    pub fn from_payload(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self { message }
    }
}

/// Returned when parsing an [`EventKind`] from an unknown name.
#[derive(Debug, Clone, Error)]
#[error("unknown event kind '{0}'")]
pub struct UnknownEventKind(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_payload_is_rendered() {
        let err = PanicError::from_payload(Box::new("boom"));
        assert_eq!(err.message, "boom");

        let err = PanicError::from_payload(Box::new(String::from("owned boom")));
        assert_eq!(err.to_string(), "panicked: owned boom");

        let err = PanicError::from_payload(Box::new(42_u8));
        assert_eq!(err.message, "non-string panic payload");
    }

    #[test]
    fn test_construction_error_keeps_source() {
        let err = ServiceError::Construction {
            type_name: "Greeter",
            source: "missing token".into(),
        };
        assert_eq!(
            err.to_string(),
            "failed to construct service 'Greeter': missing token"
        );
        assert!(std::error::Error::source(&err).is_some());
    }
}
