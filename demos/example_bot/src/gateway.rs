//! A gateway client that replays a fixed timeline instead of connecting to
//! a real chat platform.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use herald::prelude::*;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// One scripted step: wait `delay`, then raise `event`.
struct Step {
    delay: Duration,
    event: BoxedEvent,
}

pub struct SimulatedGateway {
    timeline: Mutex<Vec<Step>>,
    subscribers: Mutex<Vec<(EventKind, Arc<dyn Dispatcher>)>>,
    connected: AtomicBool,
    presence: Mutex<Option<Activity>>,
}

impl SimulatedGateway {
    pub fn new() -> Self {
        Self {
            timeline: Mutex::new(Vec::new()),
            subscribers: Mutex::new(Vec::new()),
            connected: AtomicBool::new(false),
            presence: Mutex::new(None),
        }
    }

    /// Ready, a member joining, a deleted message and the member leaving.
    pub fn with_demo_timeline() -> Self {
        let bot = UserRef {
            id: 1,
            name: "herald-example".into(),
            bot: true,
        };
        let alice = UserRef {
            id: 42,
            name: "alice".into(),
            bot: false,
        };
        let guild = GuildRef {
            id: 7,
            name: "Herald Testing Grounds".into(),
        };

        Self::new()
            .then(
                Duration::from_millis(500),
                ReadyEvent {
                    shard_id: None,
                    session_id: "simulated".into(),
                    user: bot,
                },
            )
            .then(
                Duration::from_secs(2),
                MemberJoinedEvent {
                    member: MemberRef {
                        user: alice.clone(),
                        guild: guild.clone(),
                        nick: None,
                    },
                },
            )
            .then(
                Duration::from_secs(3),
                MessageDeletedEvent {
                    message_id: 1001,
                    channel_id: 70,
                },
            )
            .then(
                Duration::from_secs(5),
                MemberLeftEvent { user: alice, guild },
            )
    }

    /// Appends a step to the timeline.
    pub fn then(self, delay: Duration, event: impl Event) -> Self {
        self.timeline.lock().push(Step {
            delay,
            event: BoxedEvent::new(event),
        });
        self
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn presence(&self) -> Option<Activity> {
        self.presence.lock().clone()
    }

    pub async fn set_presence(&self, activity: Activity) -> Result<(), BoxError> {
        if !self.is_connected() {
            return Err("gateway is not connected".into());
        }
        debug!(%activity, "Presence updated");
        *self.presence.lock() = Some(activity);
        Ok(())
    }

    fn subscribers_for(&self, kind: EventKind) -> Vec<Arc<dyn Dispatcher>> {
        self.subscribers
            .lock()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, dispatcher)| Arc::clone(dispatcher))
            .collect()
    }
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GatewayClient for SimulatedGateway {
    fn subscribe(&self, kind: EventKind, dispatcher: Arc<dyn Dispatcher>) {
        self.subscribers.lock().push((kind, dispatcher));
    }

    async fn run(&self, shutdown: CancellationToken) -> Result<(), BoxError> {
        self.connected.store(true, Ordering::Release);
        info!("Simulated gateway connected");

        let timeline = std::mem::take(&mut *self.timeline.lock());
        for step in timeline {
            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(step.delay) => {}
            }
            for dispatcher in self.subscribers_for(step.event.kind()) {
                dispatcher.dispatch(step.event.clone()).await;
            }
        }

        shutdown.cancelled().await;
        self.connected.store(false, Ordering::Release);
        info!("Simulated gateway disconnected");
        Ok(())
    }
}
