//! The lifecycle coordinator.
//!
//! [`HeraldRuntime`] wires a gateway client to the services of an
//! application and then hands control to the client's run loop:
//!
//! 1. discover services and register the gateway client itself,
//! 2. build the handler map,
//! 3. subscribe the dispatcher to every [`EventKind`],
//! 4. initialize services in discovery order,
//! 5. start every scheduled task,
//! 6. run the gateway client until it stops or shutdown is requested.
//!
//! Sharded clients defer steps 4 and 5 to the first
//! [`Ready`](EventKind::Ready) event.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use herald_runtime::HeraldRuntime;
//!
//! // Auto-loads herald.toml from the current directory
//! let runtime = HeraldRuntime::new();
//! runtime.run(Arc::new(my_gateway)).await?;
//!
//! // Custom configuration and a base collection
//! let runtime = HeraldRuntime::builder()
//!     .config_file("config/herald.toml")
//!     .profile("production")
//!     .services(base_services)
//!     .build()?;
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use herald_core::{
    BoxedEvent, Dispatcher, EventKind, GatewayClient, LogSink, ServiceCollection,
    ServiceProvider, Severity,
};
use herald_framework::lifecycle::{initialize_services, start_schedules, stop_schedules};
use herald_framework::{EventDispatcher, HandlerRegistry, LOG_SOURCE, ScheduleHandle};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{ConfigLoader, ConfigResult, HeraldConfig};
use crate::error::{RuntimeError, RuntimeResult};
use crate::latch::ReadyLatch;
use crate::logging;
use crate::sink::TracingSink;

/// The main Herald runtime.
///
/// Holds the configuration, the base service collection and the log sink.
/// Nothing is resolved until [`run`](Self::run); every run builds a fresh
/// provider.
pub struct HeraldRuntime {
    config: HeraldConfig,
    services: ServiceCollection,
    sink: Arc<dyn LogSink>,
}

impl HeraldRuntime {
    /// Creates a runtime from `herald.toml` in the current directory, or
    /// from defaults if loading fails.
    pub fn new() -> Self {
        let config = ConfigLoader::new()
            .with_current_dir()
            .load()
            .unwrap_or_else(|e| {
                eprintln!("Warning: Failed to load config ({e}), using defaults");
                HeraldConfig::default()
            });

        Self::from_config(&config)
    }

    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// Creates a runtime from configuration, initializing logging and the
    /// default [`TracingSink`].
    pub fn from_config(config: &HeraldConfig) -> Self {
        logging::init_from_config(&config.logging);

        let sink = TracingSink::from_config(&config.logging.sink).unwrap_or_else(|e| {
            warn!(error = %e, "Invalid log sink settings, using defaults");
            TracingSink::new()
        });

        info!(
            log_level = %config.logging.level,
            dispatch_mode = ?config.runtime.dispatch_mode(),
            "Runtime initialized from configuration"
        );

        Self {
            config: config.clone(),
            services: ServiceCollection::new(),
            sink: Arc::new(sink),
        }
    }

    pub fn config(&self) -> &HeraldConfig {
        &self.config
    }

    /// The base collection every run starts from.
    pub fn services(&self) -> &ServiceCollection {
        &self.services
    }

    pub fn services_mut(&mut self) -> &mut ServiceCollection {
        &mut self.services
    }

    pub fn log_sink(&self) -> &Arc<dyn LogSink> {
        &self.sink
    }

    /// Runs until the gateway client stops or Ctrl+C / SIGTERM is received.
    pub async fn run<G: GatewayClient>(&self, gateway: Arc<G>) -> RuntimeResult<()> {
        info!("Herald is starting. Press Ctrl+C to stop.");
        self.run_until(gateway, wait_for_shutdown()).await
    }

    /// Runs until the gateway client stops or `shutdown` completes.
    ///
    /// On shutdown the client's run loop is cancelled and awaited, then
    /// every schedule is stopped. A failed deferred initialization ends the
    /// run the same way and is returned as the error.
    pub async fn run_until<G, F>(&self, gateway: Arc<G>, shutdown: F) -> RuntimeResult<()>
    where
        G: GatewayClient,
        F: Future<Output = ()>,
    {
        let provider = Arc::new(self.collect_services(&gateway).build());
        let handlers = HandlerRegistry::build(&provider, self.sink.as_ref())?;
        let dispatcher = EventDispatcher::new(
            handlers,
            self.config.runtime.dispatch_mode(),
            Arc::clone(&self.sink),
        );

        let token = CancellationToken::new();
        let startup = Arc::new(Startup::new(provider, Arc::clone(&self.sink), token.clone()));
        let sharded = gateway.is_sharded();

        let subscriber: Arc<dyn Dispatcher> = if sharded {
            Arc::new(DeferredStartup {
                startup: Arc::clone(&startup),
                inner: dispatcher,
            })
        } else {
            Arc::new(dispatcher)
        };
        for &kind in EventKind::ALL {
            gateway.subscribe(kind, Arc::clone(&subscriber));
        }
        debug!(kinds = EventKind::ALL.len(), sharded, "Dispatcher subscribed");

        if sharded {
            info!("Sharded gateway, deferring service startup to the first Ready event");
        } else {
            startup.start().await?;
        }

        let result = {
            let run = gateway.run(token.clone());
            tokio::pin!(run);
            tokio::select! {
                result = &mut run => result,
                () = shutdown => {
                    info!("Shutdown requested");
                    token.cancel();
                    run.await
                }
            }
        };
        token.cancel();

        startup.stop().await;
        info!("Herald stopped");

        if let Some(err) = startup.take_failure() {
            return Err(err);
        }
        result.map_err(RuntimeError::Gateway)
    }

    /// The base collection plus discovered services plus the gateway.
    fn collect_services<G: GatewayClient>(&self, gateway: &Arc<G>) -> ServiceCollection {
        let mut services = self.services.clone();

        if self.config.runtime.discover_services {
            let root = self.config.runtime.module_discovery.as_deref();
            let count = services.discover(root);
            self.sink.log(
                LOG_SOURCE,
                Severity::Information,
                &format!(
                    "Discovered {count} service(s) under {}.",
                    root.unwrap_or("all modules")
                ),
                None,
            );
        }

        if services.contains::<G>() {
            warn!("Gateway type already registered, ignoring the running gateway instance");
            self.sink.log(
                LOG_SOURCE,
                Severity::Warning,
                "Gateway type is already registered; the existing registration is kept.",
                None,
            );
        } else {
            services.add_instance(Arc::clone(gateway));
        }
        services
    }
}

impl Default for HeraldRuntime {
    fn default() -> Self {
        Self::new()
    }
}

/// Waits for shutdown signals (Ctrl+C or SIGTERM).
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => {
                        info!("Received Ctrl+C, shutting down");
                    }
                    _ = sigterm.recv() => {
                        info!("Received SIGTERM, shutting down");
                    }
                }
                return;
            }
            Err(e) => warn!(error = %e, "Failed to register SIGTERM handler"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            warn!(error = %e, "Failed to listen for Ctrl+C, running until the gateway stops");
            std::future::pending::<()>().await;
        }
    }
}

// =============================================================================
// Startup
// =============================================================================

/// Service initialization and schedule start, run at most once per run.
struct Startup {
    provider: Arc<ServiceProvider>,
    sink: Arc<dyn LogSink>,
    latch: ReadyLatch,
    schedules: Mutex<Vec<ScheduleHandle>>,
    failure: Mutex<Option<RuntimeError>>,
    shutdown: CancellationToken,
}

impl Startup {
    fn new(
        provider: Arc<ServiceProvider>,
        sink: Arc<dyn LogSink>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            provider,
            sink,
            latch: ReadyLatch::new(),
            schedules: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
            shutdown,
        }
    }

    /// Initializes services and starts schedules unless another caller
    /// already did. Returns `false` if the work was already claimed.
    async fn start(&self) -> RuntimeResult<bool> {
        if !self.latch.try_begin() {
            return Ok(false);
        }
        let result = self.start_inner().await;
        self.latch.complete();
        result.map(|()| true)
    }

    async fn start_inner(&self) -> RuntimeResult<()> {
        let count = initialize_services(&self.provider, self.sink.as_ref()).await?;
        let handles = start_schedules(&self.provider, Arc::clone(&self.sink))?;
        info!(
            services = count,
            schedules = handles.len(),
            "Service startup complete"
        );
        self.schedules.lock().extend(handles);
        Ok(())
    }

    /// Deferred form of [`start`](Self::start): a failure is recorded and
    /// cancels the run instead of being returned.
    async fn start_on_ready(&self) {
        if let Err(err) = self.start().await {
            error!(error = %err, "Deferred service startup failed");
            self.sink.log(
                LOG_SOURCE,
                Severity::Critical,
                "Service startup failed, shutting down.",
                Some(&err),
            );
            *self.failure.lock() = Some(err);
            self.shutdown.cancel();
        }
    }

    fn has_failed(&self) -> bool {
        self.failure.lock().is_some()
    }

    fn take_failure(&self) -> Option<RuntimeError> {
        self.failure.lock().take()
    }

    async fn stop(&self) {
        let handles = std::mem::take(&mut *self.schedules.lock());
        if !handles.is_empty() {
            debug!(schedules = handles.len(), "Stopping schedules");
        }
        stop_schedules(handles).await;
    }
}

/// Dispatcher used for sharded gateways: the first Ready event runs
/// service startup before its own handlers.
struct DeferredStartup {
    startup: Arc<Startup>,
    inner: EventDispatcher,
}

#[async_trait]
impl Dispatcher for DeferredStartup {
    async fn dispatch(&self, event: BoxedEvent) {
        if event.kind() == EventKind::Ready {
            self.startup.start_on_ready().await;
        }
        if self.startup.has_failed() {
            return;
        }
        self.inner.dispatch(event).await;
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for creating a [`HeraldRuntime`] with custom configuration.
///
/// ```rust,ignore
/// let runtime = HeraldRuntime::builder()
///     .config_file("config/herald.toml")
///     .set("runtime.run_handlers_on_gateway_thread", false)
///     .services(base_services)
///     .build()?;
/// ```
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    config: Option<HeraldConfig>,
    services: ServiceCollection,
    sink: Option<Arc<dyn LogSink>>,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
            config: None,
            services: ServiceCollection::new(),
            sink: None,
        }
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g., "development", "production").
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<std::path::Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    /// Enables loading `HERALD_*` environment variables (enabled by default).
    pub fn with_env(mut self) -> Self {
        self.config_loader = self.config_loader.with_env();
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges additional configuration programmatically.
    pub fn merge(mut self, config: HeraldConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Overrides a single key, e.g. `("logging.level", "debug")`.
    pub fn set<T: Serialize>(mut self, key: &str, value: T) -> Self {
        self.config_loader = self.config_loader.set(key, value);
        self
    }

    /// Uses `config` as-is and skips loading entirely.
    pub fn config(mut self, config: HeraldConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// The base service collection discovered services are added to.
    pub fn services(mut self, services: ServiceCollection) -> Self {
        self.services = services;
        self
    }

    /// Replaces the default [`TracingSink`].
    pub fn log_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> ConfigResult<HeraldRuntime> {
        let config = match self.config {
            Some(config) => config,
            None => self.config_loader.load()?,
        };

        let mut runtime = HeraldRuntime::from_config(&config);
        runtime.services = self.services;
        if let Some(sink) = self.sink {
            runtime.sink = sink;
        }
        Ok(runtime)
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
