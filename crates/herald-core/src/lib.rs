//! # Herald Core
//!
//! The fundamental building blocks of the Herald bot lifecycle layer.
//!
//! Herald sits on top of an external gateway client. It never speaks a
//! network protocol itself; instead it owns the glue around one:
//!
//! - **Events**: a closed set of [`EventKind`]s, one typed payload per kind,
//!   and the type-erased [`BoxedEvent`] carrier.
//! - **Capabilities**: [`Handler<E>`], [`Service`] and [`ScheduledTask`]
//!   describe what an application component does.
//! - **Service locator**: [`ServiceCollection`] / [`ServiceProvider`] resolve
//!   one singleton per type and remember which capabilities each type has.
//! - **Discovery**: [`register_service!`] adds a type to a link-time registry
//!   so it is picked up without any runtime type introspection.
//! - **Collaborators**: [`LogSink`] and [`GatewayClient`] are the only
//!   interfaces the dispatch core needs from the outside world.
//!
//! ```text
//! ┌──────────────┐  BoxedEvent  ┌────────────┐     ┌─────────────────┐
//! │ GatewayClient│─────────────▶│ Dispatcher │────▶│ Handler<E> (×N) │
//! └──────────────┘              └────────────┘     └─────────────────┘
//!                                     ▲
//!                 ServiceProvider ────┘ (singletons, resolved once)
//! ```

pub mod capability;
pub mod error;
pub mod event;
pub mod gateway;
pub mod log;
pub mod service;

pub use capability::{Handler, ScheduledTask, Service};
pub use error::{BoxError, PanicError, PayloadMismatch, ServiceError, UnknownEventKind};
pub use event::{BoxedEvent, Event, EventKind};
pub use gateway::{Dispatcher, GatewayClient};
pub use log::{LogEntry, LogSink, RecordingSink, Severity, render_error_chain};
pub use service::{
    DiscoveredService, FromServices, HandlerFn, ServiceCollection, ServiceDescriptor,
    ServiceProvider, ServiceRegistration,
};

#[doc(hidden)]
pub use linkme;

/// Prelude for common imports.
pub mod prelude {
    pub use super::capability::{Handler, ScheduledTask, Service};
    pub use super::error::BoxError;
    pub use super::event::model::*;
    pub use super::event::payload::*;
    pub use super::event::{BoxedEvent, Event, EventKind};
    pub use super::log::{LogSink, Severity};
    pub use super::service::{FromServices, ServiceCollection, ServiceProvider};
}
