//! # Herald Framework
//!
//! The moving parts between a gateway client and application code:
//!
//! - [`HandlerRegistry`] builds the immutable [`HandlerMap`] from a
//!   [`ServiceProvider`](herald_core::ServiceProvider), once, at startup.
//! - [`EventDispatcher`] fans each incoming event out to the handlers bound
//!   to its kind, inline or on a detached task, isolating every failure.
//! - [`Scheduler`] runs [`ScheduledTask`](herald_core::ScheduledTask)s on a
//!   fixed interval until stopped.
//! - [`lifecycle`] initializes services and starts schedules in order.
//!
//! Every caught failure is reported through a
//! [`LogSink`](herald_core::LogSink); nothing here returns a handler or
//! scheduled-task error to its caller.

pub mod dispatcher;
pub mod error;
pub mod lifecycle;
pub mod registry;
pub mod scheduler;

pub use dispatcher::{DispatchMode, EventDispatcher};
pub use error::{HandlerFailed, InitializationError, StartupError};
pub use registry::{BoxedHandlerService, HandlerMap, HandlerRegistry, RegisteredHandler};
pub use scheduler::{ScheduleHandle, Scheduler, TaskState};

/// Log source used for framework-level entries that are not attributed to
/// an event kind, service or task.
pub const LOG_SOURCE: &str = "Herald";
