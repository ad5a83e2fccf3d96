//! Herald Runtime - configuration, logging and lifecycle orchestration.
//!
//! This crate provides:
//! - Layered configuration (`herald.toml`, profiles, `HERALD_*` variables)
//! - Logging setup and the default [`TracingSink`]
//! - The lifecycle coordinator ([`HeraldRuntime`])
//!
//! ```ignore
//! use herald_runtime::HeraldRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = HeraldRuntime::new();
//!
//!     // Discovers every `register_service!` type, initializes services,
//!     // starts schedules, then runs the gateway until Ctrl+C.
//!     runtime.run(Arc::new(MyGateway::connect().await?)).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod latch;
pub mod logging;
pub mod runtime;
pub mod sink;

// Re-exports
pub use config::{ConfigError, ConfigLoader, ConfigResult, HeraldConfig, RuntimeConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use latch::{LatchState, ReadyLatch};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{HeraldRuntime, RuntimeBuilder};
pub use sink::TracingSink;

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient imports.
///
/// This provides all the commonly used logging macros:
/// - `trace!`, `debug!`, `info!`, `warn!`, `error!`
/// - `span`, `event`
/// - `instrument` attribute
/// - `Level` for span creation
pub mod prelude {
    pub use tracing::{Level, debug, error, event, info, instrument, span, trace, warn};
}
