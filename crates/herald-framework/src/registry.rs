//! Handler registry.
//!
//! Built exactly once at startup from the service provider. The resulting
//! [`HandlerMap`] is never mutated again, so any number of dispatches can
//! read it concurrently.

use std::collections::BTreeMap;

use herald_core::{
    BoxError, BoxedEvent, EventKind, HandlerFn, LogSink, ServiceError, ServiceProvider, Severity,
};
use tower::ServiceExt;
use tower::util::BoxCloneSyncService;
use tracing::debug;

use crate::LOG_SOURCE;

/// Type-erased handler service.
pub type BoxedHandlerService = BoxCloneSyncService<BoxedEvent, (), BoxError>;

/// One handler in a [`HandlerMap`], tagged with the service it belongs to.
#[derive(Clone)]
pub struct RegisteredHandler {
    service: &'static str,
    inner: BoxedHandlerService,
}

impl RegisteredHandler {
    /// Wraps any tower service accepting a [`BoxedEvent`].
    pub fn new<S>(service: &'static str, inner: S) -> Self
    where
        S: tower::Service<BoxedEvent, Response = (), Error = BoxError>
            + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        Self {
            service,
            inner: BoxCloneSyncService::new(inner),
        }
    }

    /// Wraps a handler bound by the service provider.
    pub fn from_fn(service: &'static str, handler: HandlerFn) -> Self {
        Self::new(
            service,
            tower::service_fn(move |event: BoxedEvent| handler(event)),
        )
    }

    /// Short name of the owning service.
    pub fn service_name(&self) -> &'static str {
        self.service
    }

    /// Runs the handler for one event.
    pub async fn call(&self, event: BoxedEvent) -> Result<(), BoxError> {
        self.inner.clone().oneshot(event).await
    }
}

impl std::fmt::Debug for RegisteredHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredHandler")
            .field("service", &self.service)
            .finish_non_exhaustive()
    }
}

/// Event kind → ordered handler list.
#[derive(Debug, Clone, Default)]
pub struct HandlerMap {
    handlers: BTreeMap<EventKind, Vec<RegisteredHandler>>,
}

impl HandlerMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `handler` to the list for `kind`.
    pub fn insert(&mut self, kind: EventKind, handler: RegisteredHandler) {
        self.handlers.entry(kind).or_default().push(handler);
    }

    /// Handlers for `kind` in registration order; empty when none are bound.
    pub fn get(&self, kind: EventKind) -> &[RegisteredHandler] {
        self.handlers.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of kinds with at least one handler.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Kinds with at least one handler.
    pub fn kinds(&self) -> impl Iterator<Item = EventKind> + '_ {
        self.handlers.keys().copied()
    }

    /// Total number of handler bindings across all kinds.
    pub fn handler_count(&self) -> usize {
        self.handlers.values().map(Vec::len).sum()
    }
}

/// Builds a [`HandlerMap`] from the capability bindings of a provider.
pub struct HandlerRegistry;

impl HandlerRegistry {
    /// Walks [`EventKind::ALL`], resolving every service bound to each kind.
    ///
    /// Resolution errors are startup errors and are returned as-is.
    pub fn build(
        provider: &ServiceProvider,
        sink: &dyn LogSink,
    ) -> Result<HandlerMap, ServiceError> {
        let mut map = HandlerMap::new();
        for &kind in EventKind::ALL {
            for (service, handler) in provider.handlers_for(kind)? {
                map.insert(kind, RegisteredHandler::from_fn(service, handler));
            }
            sink.log(
                LOG_SOURCE,
                Severity::Debug,
                &format!("Created an event handler entry for type {kind}."),
                None,
            );
        }
        debug!(
            kinds = map.len(),
            handlers = map.handler_count(),
            "Handler map built"
        );
        Ok(map)
    }
}
