//! Service locator.
//!
//! A [`ServiceCollection`] records *how* to build each service and *which
//! capabilities* it has; [`ServiceCollection::build`] turns it into an
//! immutable [`ServiceProvider`] that constructs every singleton lazily and
//! exactly once.
//!
//! ```rust,ignore
//! let mut services = ServiceCollection::new();
//! services.add_instance(Arc::new(gateway));
//! services
//!     .add_service::<MemberLogging>()
//!     .handles::<MemberJoinedEvent>()
//!     .handles::<MemberLeftEvent>();
//! services.add_service::<CyclingActivity>().scheduled();
//!
//! let provider = services.build();
//! let logging: Arc<MemberLogging> = provider.resolve()?;
//! ```
//!
//! Types can also register themselves at link time with
//! [`register_service!`](crate::register_service); see [`discovery`].

pub mod collection;
pub mod discovery;
pub mod provider;

use std::any::{Any, TypeId};
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::capability::{Handler, ScheduledTask, Service};
use crate::error::{BoxError, PayloadMismatch, ServiceError};
use crate::event::{BoxedEvent, Event, EventKind};

pub use collection::{ServiceCollection, ServiceRegistration};
pub use discovery::{DISCOVERED_SERVICES, DiscoveredService};
pub use provider::ServiceProvider;

/// Type-erased singleton as stored by the provider.
pub type ServiceArc = Arc<dyn Any + Send + Sync>;

/// A handler bound to its singleton, taking any [`BoxedEvent`].
///
/// The payload is downcast inside; a kind mismatch is reported as a
/// [`PayloadMismatch`] error rather than a panic.
pub type HandlerFn =
    Arc<dyn Fn(BoxedEvent) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// Constructs a service from other services.
///
/// This is the constructor-injection hook: implementors resolve whatever
/// they depend on from `services`.
///
/// ```rust,ignore
/// impl FromServices for CyclingActivity {
///     fn from_services(services: &ServiceProvider) -> Result<Self, BoxError> {
///         Ok(Self { gateway: services.resolve()? })
///     }
/// }
/// ```
pub trait FromServices: Sized + Send + Sync + 'static {
    fn from_services(services: &ServiceProvider) -> Result<Self, BoxError>;
}

/// Public, read-only view of one registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDescriptor {
    /// Full type path.
    pub type_name: &'static str,
    /// Short type name used as a log source.
    pub name: &'static str,
    /// Event kinds this service handles, in binding order.
    pub handles: Vec<EventKind>,
    /// Whether the lifecycle calls [`Service::initialize`] on it.
    pub initializable: bool,
    /// Whether the lifecycle starts it as a [`ScheduledTask`].
    pub scheduled: bool,
}

// =============================================================================
// Registration (internal)
// =============================================================================

pub(crate) type Factory =
    Arc<dyn Fn(&ServiceProvider) -> Result<ServiceArc, BoxError> + Send + Sync>;

type ServiceBinder = fn(ServiceArc, &'static str) -> Result<Arc<dyn Service>, ServiceError>;
type ScheduleBinder = fn(ServiceArc, &'static str) -> Result<Arc<dyn ScheduledTask>, ServiceError>;
type HandlerBinder = fn(ServiceArc, &'static str) -> Result<HandlerFn, ServiceError>;

#[derive(Clone, Copy)]
pub(crate) struct HandlerBinding {
    pub(crate) kind: EventKind,
    pub(crate) bind: HandlerBinder,
}

#[derive(Clone)]
pub(crate) struct Registration {
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) name: &'static str,
    pub(crate) factory: Factory,
    pub(crate) handlers: Vec<HandlerBinding>,
    pub(crate) initializer: Option<ServiceBinder>,
    pub(crate) schedule: Option<ScheduleBinder>,
}

impl Registration {
    pub(crate) fn new<T: Any + Send + Sync>(factory: Factory) -> Self {
        let type_name = std::any::type_name::<T>();
        Self {
            type_id: TypeId::of::<T>(),
            type_name,
            name: short_type_name(type_name),
            factory,
            handlers: Vec::new(),
            initializer: None,
            schedule: None,
        }
    }

    pub(crate) fn add_handler(&mut self, binding: HandlerBinding) {
        if !self.handlers.iter().any(|b| b.kind == binding.kind) {
            self.handlers.push(binding);
        }
    }

    /// Folds the capabilities of a duplicate registration into this one.
    /// The first factory wins.
    pub(crate) fn absorb(&mut self, other: Registration) {
        for binding in other.handlers {
            self.add_handler(binding);
        }
        self.initializer = self.initializer.or(other.initializer);
        self.schedule = self.schedule.or(other.schedule);
    }

    pub(crate) fn descriptor(&self) -> ServiceDescriptor {
        ServiceDescriptor {
            type_name: self.type_name,
            name: self.name,
            handles: self.handlers.iter().map(|b| b.kind).collect(),
            initializable: self.initializer.is_some(),
            scheduled: self.schedule.is_some(),
        }
    }
}

/// `my_bot::services::MemberLogging` → `MemberLogging`.
pub(crate) fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

// =============================================================================
// Capability binders
// =============================================================================

fn downcast<T: Any + Send + Sync>(
    instance: ServiceArc,
    type_name: &'static str,
) -> Result<Arc<T>, ServiceError> {
    instance
        .downcast::<T>()
        .map_err(|_| ServiceError::TypeMismatch { type_name })
}

pub(crate) fn bind_service<T: Service>(
    instance: ServiceArc,
    type_name: &'static str,
) -> Result<Arc<dyn Service>, ServiceError> {
    Ok(downcast::<T>(instance, type_name)? as Arc<dyn Service>)
}

pub(crate) fn bind_schedule<T: ScheduledTask>(
    instance: ServiceArc,
    type_name: &'static str,
) -> Result<Arc<dyn ScheduledTask>, ServiceError> {
    Ok(downcast::<T>(instance, type_name)? as Arc<dyn ScheduledTask>)
}

pub(crate) fn bind_handler<T, E>(
    instance: ServiceArc,
    type_name: &'static str,
) -> Result<HandlerFn, ServiceError>
where
    T: Handler<E>,
    E: Event,
{
    let service = downcast::<T>(instance, type_name)?;
    Ok(Arc::new(move |event: BoxedEvent| {
        let service = Arc::clone(&service);
        async move {
            let payload = event.downcast_ref::<E>().ok_or(PayloadMismatch {
                expected: E::KIND,
                found: event.kind(),
            })?;
            service.handle(payload).await
        }
        .boxed()
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_names_strip_module_path() {
        assert_eq!(short_type_name("a::b::MemberLogging"), "MemberLogging");
        assert_eq!(short_type_name("Plain"), "Plain");
        assert_eq!(short_type_name("a::Wrapper<b::Inner>"), "Wrapper");
    }
}
