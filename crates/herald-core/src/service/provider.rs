//! Resolving services.

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::{HandlerFn, Registration, ServiceArc, ServiceDescriptor};
use crate::capability::{ScheduledTask, Service};
use crate::error::ServiceError;
use crate::event::EventKind;

thread_local! {
    /// Types currently being constructed on this thread, innermost last.
    static CONSTRUCTING: RefCell<Vec<TypeId>> = const { RefCell::new(Vec::new()) };
}

/// Keeps `type_id` on the construction stack until dropped, including when
/// the factory unwinds.
struct ConstructionGuard;

impl ConstructionGuard {
    fn enter(type_id: TypeId) -> Self {
        CONSTRUCTING.with(|stack| stack.borrow_mut().push(type_id));
        ConstructionGuard
    }
}

impl Drop for ConstructionGuard {
    fn drop(&mut self) {
        CONSTRUCTING.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

struct Entry {
    registration: Registration,
    instance: Mutex<Option<ServiceArc>>,
}

/// Immutable, shareable view over a built [`ServiceCollection`].
///
/// Every registered type resolves to exactly one instance for the lifetime
/// of the provider. Instances are constructed on first request; concurrent
/// first requests block on a per-service lock so the constructor still runs
/// only once.
///
/// Cycles are only detected within one thread. Two threads entering the
/// same cycle from opposite ends (`A -> B` and `B -> A`) block on each
/// other's construction lock instead of reporting
/// [`ServiceError::CircularDependency`].
///
/// [`ServiceCollection`]: super::ServiceCollection
pub struct ServiceProvider {
    entries: Vec<Entry>,
    index: HashMap<TypeId, usize>,
}

impl ServiceProvider {
    pub(crate) fn new(registrations: Vec<Registration>) -> Self {
        let index = registrations
            .iter()
            .enumerate()
            .map(|(i, r)| (r.type_id, i))
            .collect();
        let entries = registrations
            .into_iter()
            .map(|registration| Entry {
                registration,
                instance: Mutex::new(None),
            })
            .collect();
        Self { entries, index }
    }

    /// Returns the singleton for `T`, constructing it if necessary.
    pub fn resolve<T: Any + Send + Sync>(&self) -> Result<Arc<T>, ServiceError> {
        let type_name = std::any::type_name::<T>();
        let index = *self
            .index
            .get(&TypeId::of::<T>())
            .ok_or(ServiceError::NotRegistered { type_name })?;
        self.instance_at(index)?
            .downcast::<T>()
            .map_err(|_| ServiceError::TypeMismatch { type_name })
    }

    /// Like [`resolve`](Self::resolve), discarding the error.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.resolve().ok()
    }

    pub fn contains<T: Any>(&self) -> bool {
        self.index.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registrations in discovery order.
    pub fn descriptors(&self) -> Vec<ServiceDescriptor> {
        self.entries
            .iter()
            .map(|e| e.registration.descriptor())
            .collect()
    }

    /// Every handler bound to `kind`, paired with its service name, in
    /// registration order. Resolves the owning singletons.
    pub fn handlers_for(
        &self,
        kind: EventKind,
    ) -> Result<Vec<(&'static str, HandlerFn)>, ServiceError> {
        let mut handlers = Vec::new();
        for (index, entry) in self.entries.iter().enumerate() {
            let registration = &entry.registration;
            for binding in registration.handlers.iter().filter(|b| b.kind == kind) {
                let instance = self.instance_at(index)?;
                handlers.push((
                    registration.name,
                    (binding.bind)(instance, registration.type_name)?,
                ));
            }
        }
        Ok(handlers)
    }

    /// Every service marked initializable, in registration order.
    pub fn initializers(&self) -> Result<Vec<(&'static str, Arc<dyn Service>)>, ServiceError> {
        let mut services = Vec::new();
        for (index, entry) in self.entries.iter().enumerate() {
            let registration = &entry.registration;
            if let Some(bind) = registration.initializer {
                let instance = self.instance_at(index)?;
                services.push((registration.name, bind(instance, registration.type_name)?));
            }
        }
        Ok(services)
    }

    /// Every service marked scheduled, in registration order.
    pub fn scheduled_tasks(
        &self,
    ) -> Result<Vec<(&'static str, Arc<dyn ScheduledTask>)>, ServiceError> {
        let mut tasks = Vec::new();
        for (index, entry) in self.entries.iter().enumerate() {
            let registration = &entry.registration;
            if let Some(bind) = registration.schedule {
                let instance = self.instance_at(index)?;
                tasks.push((registration.name, bind(instance, registration.type_name)?));
            }
        }
        Ok(tasks)
    }

    fn instance_at(&self, index: usize) -> Result<ServiceArc, ServiceError> {
        let entry = &self.entries[index];
        let registration = &entry.registration;

        // Must be checked before locking: the slot is held by our own caller.
        let reentered = CONSTRUCTING.with(|stack| stack.borrow().contains(&registration.type_id));
        if reentered {
            return Err(ServiceError::CircularDependency {
                type_name: registration.type_name,
            });
        }

        let mut slot = entry.instance.lock();
        if let Some(instance) = slot.as_ref() {
            return Ok(Arc::clone(instance));
        }

        let built = {
            let _guard = ConstructionGuard::enter(registration.type_id);
            (registration.factory)(self)
        };

        let instance = built.map_err(|source| ServiceError::Construction {
            type_name: registration.type_name,
            source,
        })?;
        debug!(service = registration.name, "Service constructed");
        *slot = Some(Arc::clone(&instance));
        Ok(instance)
    }
}

impl std::fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("services", &self.entries.len())
            .finish_non_exhaustive()
    }
}
