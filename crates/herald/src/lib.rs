//! # Herald
//!
//! A lifecycle and event-dispatch layer for chat bot gateway clients.
//!
//! Herald does not talk to any chat platform. It wraps an existing gateway
//! client and gives an application three things:
//!
//! - **Handlers**: every [`Handler<E>`](core::Handler) bound to a service is
//!   called for each event of kind `E`, in a stable order, with failures
//!   isolated per handler.
//! - **Services**: singletons with a one-time async initializer, found via
//!   [`register_service!`] or added to a base collection by hand.
//! - **Scheduled tasks**: fixed-interval loops that survive their own
//!   failures.
//!
//! ```text
//! ┌──────────────┐     ┌────────────────┐     ┌──────────────────────┐
//! │ HeraldRuntime│────▶│ EventDispatcher│────▶│ Handler<E> (service) │
//! │  (lifecycle) │     └────────────────┘     └──────────────────────┘
//! │              │────▶ initialize services ─▶ start schedules ─▶ gateway.run()
//! └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use herald::prelude::*;
//!
//! struct Greeter;
//!
//! impl FromServices for Greeter {
//!     fn from_services(_: &ServiceProvider) -> Result<Self, BoxError> {
//!         Ok(Greeter)
//!     }
//! }
//!
//! #[async_trait]
//! impl Handler<MemberJoinedEvent> for Greeter {
//!     async fn handle(&self, event: &MemberJoinedEvent) -> Result<(), BoxError> {
//!         info!(member = %event.member.user, "joined");
//!         Ok(())
//!     }
//! }
//!
//! register_service!(Greeter, handles [MemberJoinedEvent]);
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     HeraldRuntime::new().run(Arc::new(MyGateway::connect().await?)).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: read `herald.toml` (default)
//! - `yaml-config`: read `herald.yaml`
//! - `json-log`: JSON log output

pub use herald_core as core;
pub use herald_framework as framework;
pub use herald_runtime as runtime;

pub use herald_core::register_service;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use herald::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use herald_runtime::{HeraldConfig, HeraldRuntime, RuntimeError};

    // Events, capabilities and the service locator
    pub use herald_core::prelude::*;
    pub use herald_core::register_service;
    pub use herald_core::{Dispatcher, GatewayClient};

    // Dispatch building blocks for custom runtimes
    pub use herald_framework::{DispatchMode, EventDispatcher, Scheduler};

    pub use async_trait::async_trait;

    // Logging macros
    pub use herald_runtime::prelude::*;
}
