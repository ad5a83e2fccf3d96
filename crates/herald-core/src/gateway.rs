//! Interfaces to the external gateway client.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::BoxError;
use crate::event::{BoxedEvent, EventKind};

/// Event dispatcher: receives gateway events and distributes them to
/// handlers.
///
/// Use `Arc<dyn Dispatcher>` to hand a dispatcher to a gateway client.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Dispatch `event` to every handler registered for its kind.
    ///
    /// Depending on configuration this returns after all handlers finished
    /// or as soon as the work has been handed off to a background task.
    async fn dispatch(&self, event: BoxedEvent);
}

/// The external gateway/command client Herald wraps.
///
/// The client owns the connection, decoding and its own run loop. Herald
/// only subscribes a dispatcher to each event kind and then hands control
/// to [`run`](GatewayClient::run).
#[async_trait]
pub trait GatewayClient: Send + Sync + 'static {
    /// Route every future event of `kind` to `dispatcher`.
    ///
    /// Herald subscribes to all kinds and makes no assumption about which
    /// of them the client will ever raise.
    fn subscribe(&self, kind: EventKind, dispatcher: Arc<dyn Dispatcher>);

    /// Whether this client coordinates several shards.
    ///
    /// Sharded clients defer service initialization until the first
    /// [`Ready`](EventKind::Ready) event.
    fn is_sharded(&self) -> bool {
        false
    }

    /// Runs the client until it disconnects or `shutdown` is cancelled.
    async fn run(&self, shutdown: CancellationToken) -> Result<(), BoxError>;
}
