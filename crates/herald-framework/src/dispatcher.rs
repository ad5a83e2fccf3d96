//! Event dispatcher.
//!
//! [`EventDispatcher`] looks up the handler list for each incoming event and
//! runs it. Handlers for one event always run sequentially in registration
//! order; [`DispatchMode`] only decides whether the caller waits for them.
//!
//! ```rust,ignore
//! let map = HandlerRegistry::build(&provider, sink.as_ref())?;
//! let dispatcher = Arc::new(EventDispatcher::new(map, DispatchMode::Inline, sink));
//! for &kind in EventKind::ALL {
//!     gateway.subscribe(kind, dispatcher.clone());
//! }
//! ```

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use herald_core::{BoxError, BoxedEvent, Dispatcher, LogSink, PanicError, Severity};
use tracing::{Instrument, debug_span, trace};

use crate::error::HandlerFailed;
use crate::registry::HandlerMap;

/// Message logged for every failed handler invocation.
pub const HANDLER_FAILED_MESSAGE: &str = "An exception occurred handling this event type.";

/// Whether the caller of [`dispatch`](Dispatcher::dispatch) waits for the
/// handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// Run all handlers before returning. The gateway cannot deliver the
    /// next event until the current one is fully handled.
    #[default]
    Inline,
    /// Hand the handlers to a detached tokio task and return immediately.
    /// Events may then be handled in any order relative to each other.
    Offloaded,
}

impl DispatchMode {
    /// Maps the `run_handlers_on_gateway_thread` setting.
    pub fn from_gateway_thread(run_on_gateway_thread: bool) -> Self {
        if run_on_gateway_thread {
            DispatchMode::Inline
        } else {
            DispatchMode::Offloaded
        }
    }
}

struct Inner {
    handlers: HandlerMap,
    sink: Arc<dyn LogSink>,
}

/// Routes events to the handlers in a [`HandlerMap`].
///
/// Cheap to clone; clones share the same map and sink.
#[derive(Clone)]
pub struct EventDispatcher {
    inner: Arc<Inner>,
    mode: DispatchMode,
}

impl EventDispatcher {
    pub fn new(handlers: HandlerMap, mode: DispatchMode, sink: Arc<dyn LogSink>) -> Self {
        Self {
            inner: Arc::new(Inner { handlers, sink }),
            mode,
        }
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    pub fn handlers(&self) -> &HandlerMap {
        &self.inner.handlers
    }
}

impl Inner {
    async fn run_handlers(&self, event: BoxedEvent) {
        let kind = event.kind();
        let handlers = self.handlers.get(kind);
        let span = debug_span!("dispatch", event_kind = %kind, handlers = handlers.len());

        async {
            for handler in handlers {
                let outcome = AssertUnwindSafe(handler.call(event.clone()))
                    .catch_unwind()
                    .await;
                let source: BoxError = match outcome {
                    Ok(Ok(())) => continue,
                    Ok(Err(error)) => error,
                    Err(panic) => Box::new(PanicError::from_payload(panic)),
                };
                let failure = HandlerFailed {
                    service: handler.service_name(),
                    source,
                };
                self.sink.log(
                    kind.name(),
                    Severity::Error,
                    HANDLER_FAILED_MESSAGE,
                    Some(&failure),
                );
            }
        }
        .instrument(span)
        .await
    }
}

#[async_trait]
impl Dispatcher for EventDispatcher {
    async fn dispatch(&self, event: BoxedEvent) {
        if self.inner.handlers.get(event.kind()).is_empty() {
            trace!(event_kind = %event.kind(), "No handlers bound, dropping event");
            return;
        }

        match self.mode {
            DispatchMode::Inline => self.inner.run_handlers(event).await,
            DispatchMode::Offloaded => {
                let inner = Arc::clone(&self.inner);
                tokio::spawn(async move { inner.run_handlers(event).await });
            }
        }
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("mode", &self.mode)
            .field("handlers", &self.inner.handlers)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use herald_core::event::model::{GuildRef, MemberRef, UserRef};
    use herald_core::RecordingSink;
    use herald_core::prelude::*;
    use parking_lot::Mutex;
    use tokio::sync::Notify;
    use tokio_test::assert_ok;

    use super::*;
    use crate::registry::HandlerRegistry;

    fn member(name: &str) -> MemberRef {
        MemberRef {
            user: UserRef {
                id: 7,
                name: name.into(),
                bot: false,
            },
            guild: GuildRef {
                id: 1,
                name: "guild".into(),
            },
            nick: None,
        }
    }

    fn joined(name: &str) -> BoxedEvent {
        BoxedEvent::new(MemberJoinedEvent {
            member: member(name),
        })
    }

    /// Builds a dispatcher whose sink is the registered `RecordingSink`,
    /// cleared of registry output.
    fn build_dispatcher(
        services: ServiceCollection,
        mode: DispatchMode,
    ) -> (EventDispatcher, Arc<RecordingSink>) {
        let provider = services.build();
        let sink: Arc<RecordingSink> = assert_ok!(provider.resolve());
        let map = assert_ok!(HandlerRegistry::build(&provider, sink.as_ref()));
        sink.clear();
        (EventDispatcher::new(map, mode, sink.clone()), sink)
    }

    // ===== MemberJoined with a logging and a failing handler =====

    struct H1 {
        sink: Arc<RecordingSink>,
    }

    impl FromServices for H1 {
        fn from_services(services: &ServiceProvider) -> Result<Self, BoxError> {
            Ok(Self {
                sink: services.resolve()?,
            })
        }
    }

    #[async_trait]
    impl Handler<MemberJoinedEvent> for H1 {
        async fn handle(&self, event: &MemberJoinedEvent) -> Result<(), BoxError> {
            self.sink.log(
                "H1",
                Severity::Information,
                &format!("{} joined", event.member.user.name),
                None,
            );
            Ok(())
        }
    }

    struct H2;

    impl FromServices for H2 {
        fn from_services(_: &ServiceProvider) -> Result<Self, BoxError> {
            Ok(H2)
        }
    }

    #[async_trait]
    impl Handler<MemberJoinedEvent> for H2 {
        async fn handle(&self, _: &MemberJoinedEvent) -> Result<(), BoxError> {
            Err("boom".into())
        }
    }

    struct Panics;

    impl FromServices for Panics {
        fn from_services(_: &ServiceProvider) -> Result<Self, BoxError> {
            Ok(Panics)
        }
    }

    #[async_trait]
    impl Handler<MemberJoinedEvent> for Panics {
        async fn handle(&self, _: &MemberJoinedEvent) -> Result<(), BoxError> {
            panic!("handler exploded");
        }
    }

    fn sink_only() -> ServiceCollection {
        let mut services = ServiceCollection::new();
        services.add_instance(Arc::new(RecordingSink::new()));
        services
    }

    #[tokio::test]
    async fn test_failing_handler_is_isolated_and_logged() {
        let mut services = sink_only();
        services.add_singleton::<H2>().handles::<MemberJoinedEvent>();
        services.add_singleton::<H1>().handles::<MemberJoinedEvent>();
        let (dispatcher, sink) = build_dispatcher(services, DispatchMode::Inline);

        dispatcher.dispatch(joined("ada")).await;

        let info = sink.at(Severity::Information);
        assert_eq!(info.len(), 1);
        assert_eq!(info[0].message, "ada joined");

        let errors = sink.at(Severity::Error);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].source, "MemberJoined");
        assert_eq!(errors[0].message, HANDLER_FAILED_MESSAGE);
        let error = errors[0].error.as_deref().unwrap();
        assert!(error.contains("H2"));
        assert!(error.contains("boom"));
    }

    #[tokio::test]
    async fn test_panicking_handler_is_isolated() {
        let mut services = sink_only();
        services
            .add_singleton::<Panics>()
            .handles::<MemberJoinedEvent>();
        services.add_singleton::<H1>().handles::<MemberJoinedEvent>();
        let (dispatcher, sink) = build_dispatcher(services, DispatchMode::Inline);

        dispatcher.dispatch(joined("grace")).await;

        assert_eq!(sink.at(Severity::Information).len(), 1);
        let errors = sink.at(Severity::Error);
        assert_eq!(errors.len(), 1);
        assert!(
            errors[0]
                .error
                .as_deref()
                .unwrap()
                .contains("handler exploded")
        );
    }

    #[tokio::test]
    async fn test_event_without_handlers_is_a_no_op() {
        let mut services = sink_only();
        services.add_singleton::<H1>().handles::<MemberJoinedEvent>();
        let (dispatcher, sink) = build_dispatcher(services, DispatchMode::Inline);

        dispatcher
            .dispatch(BoxedEvent::new(GuildUnavailableEvent { guild_id: 1 }))
            .await;

        assert!(sink.entries().is_empty());
    }

    // ===== Ordering =====

    struct Journal(Mutex<Vec<String>>);

    struct First {
        journal: Arc<Journal>,
    }

    struct Second {
        journal: Arc<Journal>,
    }

    impl FromServices for First {
        fn from_services(services: &ServiceProvider) -> Result<Self, BoxError> {
            Ok(Self {
                journal: services.resolve()?,
            })
        }
    }

    impl FromServices for Second {
        fn from_services(services: &ServiceProvider) -> Result<Self, BoxError> {
            Ok(Self {
                journal: services.resolve()?,
            })
        }
    }

    #[async_trait]
    impl Handler<MemberJoinedEvent> for First {
        async fn handle(&self, event: &MemberJoinedEvent) -> Result<(), BoxError> {
            let name = &event.member.user.name;
            self.journal.0.lock().push(format!("first:start:{name}"));
            tokio::task::yield_now().await;
            self.journal.0.lock().push(format!("first:end:{name}"));
            Ok(())
        }
    }

    #[async_trait]
    impl Handler<MemberJoinedEvent> for Second {
        async fn handle(&self, event: &MemberJoinedEvent) -> Result<(), BoxError> {
            let name = &event.member.user.name;
            self.journal.0.lock().push(format!("second:{name}"));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_inline_dispatch_completes_each_event_before_the_next() {
        let journal = Arc::new(Journal(Mutex::new(Vec::new())));
        let mut services = sink_only();
        services.add_instance(Arc::clone(&journal));
        services
            .add_singleton::<First>()
            .handles::<MemberJoinedEvent>();
        services
            .add_singleton::<Second>()
            .handles::<MemberJoinedEvent>();
        let (dispatcher, _) = build_dispatcher(services, DispatchMode::Inline);

        dispatcher.dispatch(joined("e1")).await;
        dispatcher.dispatch(joined("e2")).await;

        assert_eq!(
            *journal.0.lock(),
            [
                "first:start:e1",
                "first:end:e1",
                "second:e1",
                "first:start:e2",
                "first:end:e2",
                "second:e2",
            ]
        );
    }

    // ===== Offloaded =====

    struct Gate {
        release: Notify,
        finished: Notify,
        completed: AtomicUsize,
    }

    struct Blocking {
        gate: Arc<Gate>,
    }

    impl FromServices for Blocking {
        fn from_services(services: &ServiceProvider) -> Result<Self, BoxError> {
            Ok(Self {
                gate: services.resolve()?,
            })
        }
    }

    #[async_trait]
    impl Handler<MemberJoinedEvent> for Blocking {
        async fn handle(&self, _: &MemberJoinedEvent) -> Result<(), BoxError> {
            self.gate.release.notified().await;
            self.gate.completed.fetch_add(1, Ordering::SeqCst);
            self.gate.finished.notify_one();
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_offloaded_dispatch_returns_before_handlers_finish() {
        let gate = Arc::new(Gate {
            release: Notify::new(),
            finished: Notify::new(),
            completed: AtomicUsize::new(0),
        });
        let mut services = sink_only();
        services.add_instance(Arc::clone(&gate));
        services
            .add_singleton::<Blocking>()
            .handles::<MemberJoinedEvent>();
        let (dispatcher, sink) = build_dispatcher(services, DispatchMode::Offloaded);

        dispatcher.dispatch(joined("ada")).await;
        assert_eq!(gate.completed.load(Ordering::SeqCst), 0);

        gate.release.notify_one();
        gate.finished.notified().await;
        assert_eq!(gate.completed.load(Ordering::SeqCst), 1);
        assert!(sink.at(Severity::Error).is_empty());
    }

    #[tokio::test]
    async fn test_offloaded_failure_is_isolated_and_logged() {
        let gate = Arc::new(Gate {
            release: Notify::new(),
            finished: Notify::new(),
            completed: AtomicUsize::new(0),
        });
        let mut services = sink_only();
        services.add_instance(Arc::clone(&gate));
        services.add_singleton::<H2>().handles::<MemberJoinedEvent>();
        services
            .add_singleton::<Blocking>()
            .handles::<MemberJoinedEvent>();
        let (dispatcher, sink) = build_dispatcher(services, DispatchMode::Offloaded);

        dispatcher.dispatch(joined("ada")).await;
        gate.release.notify_one();
        gate.finished.notified().await;

        assert_eq!(gate.completed.load(Ordering::SeqCst), 1);
        let errors = sink.at(Severity::Error);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].source, "MemberJoined");
        assert_eq!(errors[0].message, HANDLER_FAILED_MESSAGE);
        assert!(errors[0].error.as_deref().unwrap().contains("boom"));
    }

    #[test]
    fn test_mode_from_setting() {
        assert_eq!(DispatchMode::from_gateway_thread(true), DispatchMode::Inline);
        assert_eq!(
            DispatchMode::from_gateway_thread(false),
            DispatchMode::Offloaded
        );
        assert_eq!(DispatchMode::default(), DispatchMode::Inline);
    }
}
