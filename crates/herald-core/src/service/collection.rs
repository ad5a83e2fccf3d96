//! Building a service collection.

use std::any::{Any, TypeId};
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::trace;

use super::{
    Factory, FromServices, HandlerBinding, Registration, ServiceArc, ServiceDescriptor, ServiceProvider,
    bind_handler, bind_schedule, bind_service,
};
use crate::capability::{Handler, ScheduledTask, Service};
use crate::error::BoxError;
use crate::event::Event;

/// Mutable set of service registrations.
///
/// Registering a type twice keeps a single registration (and therefore a
/// single instance); capabilities declared by both registrations are merged
/// and each event kind is bound at most once.
#[derive(Clone, Default)]
pub struct ServiceCollection {
    registrations: Vec<Registration>,
}

impl ServiceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an already-built instance.
    pub fn add_instance<T: Any + Send + Sync>(
        &mut self,
        instance: Arc<T>,
    ) -> ServiceRegistration<'_, T> {
        let instance: ServiceArc = instance;
        self.register::<T>(factory(move |_| Ok(Arc::clone(&instance))))
    }

    /// Registers a type built by [`FromServices`] on first resolution.
    pub fn add_singleton<T: FromServices>(&mut self) -> ServiceRegistration<'_, T> {
        self.register::<T>(factory(|services| {
            Ok(Arc::new(T::from_services(services)?) as ServiceArc)
        }))
    }

    /// Registers a type built by `build` on first resolution.
    pub fn add_factory<T, F>(&mut self, build: F) -> ServiceRegistration<'_, T>
    where
        T: Any + Send + Sync,
        F: Fn(&ServiceProvider) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        self.register::<T>(factory(move |services| {
            Ok(Arc::new(build(services)?) as ServiceArc)
        }))
    }

    /// Shorthand for `add_singleton::<T>().initializable()`.
    pub fn add_service<T: Service + FromServices>(&mut self) -> ServiceRegistration<'_, T> {
        self.add_singleton::<T>().initializable()
    }

    /// Appends every registration of `other`.
    pub fn merge(&mut self, other: ServiceCollection) -> &mut Self {
        for registration in other.registrations {
            self.insert(registration);
        }
        self
    }

    /// Whether `T` has been registered.
    pub fn contains<T: Any>(&self) -> bool {
        self.position(TypeId::of::<T>()).is_some()
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Registrations in insertion order.
    pub fn descriptors(&self) -> Vec<ServiceDescriptor> {
        self.registrations.iter().map(Registration::descriptor).collect()
    }

    /// Freezes the collection into a provider.
    pub fn build(self) -> ServiceProvider {
        ServiceProvider::new(self.registrations)
    }

    fn register<T: Any + Send + Sync>(&mut self, factory: Factory) -> ServiceRegistration<'_, T> {
        let index = self.insert(Registration::new::<T>(factory));
        ServiceRegistration {
            collection: self,
            index,
            _marker: PhantomData,
        }
    }

    fn insert(&mut self, registration: Registration) -> usize {
        match self.position(registration.type_id) {
            Some(index) => {
                trace!(
                    service = registration.name,
                    "Service already registered, merging capabilities"
                );
                self.registrations[index].absorb(registration);
                index
            }
            None => {
                self.registrations.push(registration);
                self.registrations.len() - 1
            }
        }
    }

    fn position(&self, type_id: TypeId) -> Option<usize> {
        self.registrations.iter().position(|r| r.type_id == type_id)
    }
}

fn factory<F>(f: F) -> Factory
where
    F: Fn(&ServiceProvider) -> Result<ServiceArc, BoxError> + Send + Sync + 'static,
{
    Arc::new(f)
}

impl std::fmt::Debug for ServiceCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.registrations.iter().map(|r| r.name))
            .finish()
    }
}

/// Handle returned by every `add_*` call, used to declare capabilities.
pub struct ServiceRegistration<'a, T> {
    collection: &'a mut ServiceCollection,
    index: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> ServiceRegistration<'_, T> {
    fn registration(&mut self) -> &mut Registration {
        &mut self.collection.registrations[self.index]
    }

    /// Binds `T` as a handler for `E::KIND`.
    pub fn handles<E>(mut self) -> Self
    where
        E: Event,
        T: Handler<E>,
    {
        self.registration().add_handler(HandlerBinding {
            kind: E::KIND,
            bind: bind_handler::<T, E>,
        });
        self
    }

    /// Marks `T` for initialization during startup.
    pub fn initializable(mut self) -> Self
    where
        T: Service,
    {
        self.registration().initializer = Some(bind_service::<T>);
        self
    }

    /// Marks `T` to be started as a scheduled task.
    pub fn scheduled(mut self) -> Self
    where
        T: ScheduledTask,
    {
        self.registration().schedule = Some(bind_schedule::<T>);
        self
    }

    /// Descriptor of the registration as it stands now.
    pub fn descriptor(&self) -> ServiceDescriptor {
        self.collection.registrations[self.index].descriptor()
    }
}
