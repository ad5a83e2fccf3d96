//! Capability traits implemented by application components.
//!
//! A single type may combine several capabilities: a member-logging service
//! can be a [`Service`] *and* a [`Handler`] for both `MemberJoinedEvent`
//! and `MemberLeftEvent`. Which capabilities are wired up is decided at
//! registration time (see [`ServiceRegistration`](crate::ServiceRegistration)),
//! not by inspecting the type at runtime.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::BoxError;
use crate::event::Event;

/// Reacts to every event of kind `E::KIND`.
///
/// Returning `Err` (or panicking) is logged by the dispatcher and never
/// stops the remaining handlers for the same event.
///
/// ```rust,ignore
/// struct Greeter;
///
/// #[async_trait]
/// impl Handler<MemberJoinedEvent> for Greeter {
///     async fn handle(&self, event: &MemberJoinedEvent) -> Result<(), BoxError> {
///         info!(member = %event.member.user, "welcome!");
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Handler<E: Event>: Send + Sync + 'static {
    async fn handle(&self, event: &E) -> Result<(), BoxError>;
}

/// An application component with a one-time asynchronous initialization
/// hook, resolved as a singleton.
///
/// Initializers run sequentially in discovery order during startup; an
/// error aborts startup.
#[async_trait]
pub trait Service: Send + Sync + 'static {
    async fn initialize(&self) -> Result<(), BoxError> {
        Ok(())
    }
}

/// A task that runs at a fixed interval for the lifetime of the bot.
#[async_trait]
pub trait ScheduledTask: Send + Sync + 'static {
    /// Delay between the end of one tick and the start of the next.
    fn interval(&self) -> Duration;

    /// Gate checked before every tick; returning `false` skips the body for
    /// this tick only.
    async fn is_runnable(&self) -> Result<bool, BoxError> {
        Ok(true)
    }

    /// The body of the task.
    async fn invoke(&self) -> Result<(), BoxError>;
}
