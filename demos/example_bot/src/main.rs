//! Example Bot
//!
//! A small Herald application running against a simulated gateway:
//!
//! - `MemberLoggingService` logs members joining and leaving.
//! - `CyclingActivityService` changes the bot's presence every 45 seconds.
//! - `ActivityRotation` comes from the base service collection rather than
//!   from discovery.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package example-bot
//! ```

mod gateway;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use herald::prelude::*;

use crate::gateway::SimulatedGateway;

// ============================================================================
// Services
// ============================================================================

/// Logs every member joining or leaving a guild.
pub struct MemberLoggingService;

impl FromServices for MemberLoggingService {
    fn from_services(_: &ServiceProvider) -> Result<Self, BoxError> {
        Ok(MemberLoggingService)
    }
}

#[async_trait]
impl Handler<MemberJoinedEvent> for MemberLoggingService {
    async fn handle(&self, event: &MemberJoinedEvent) -> Result<(), BoxError> {
        info!(
            source = "MemberLogging",
            "Member {} joined guild {}.", event.member.user, event.member.guild.name
        );
        Ok(())
    }
}

#[async_trait]
impl Handler<MemberLeftEvent> for MemberLoggingService {
    async fn handle(&self, event: &MemberLeftEvent) -> Result<(), BoxError> {
        info!(
            source = "MemberLogging",
            "Member {} left guild {}.", event.user, event.guild.name
        );
        Ok(())
    }
}

register_service!(MemberLoggingService, handles [MemberJoinedEvent, MemberLeftEvent]);

/// The activities the bot cycles through, handed out round-robin.
pub struct ActivityRotation {
    activities: Vec<Activity>,
    next: AtomicUsize,
}

impl ActivityRotation {
    pub fn new(activities: Vec<Activity>) -> Self {
        Self {
            activities,
            next: AtomicUsize::new(0),
        }
    }

    pub fn next(&self) -> Option<&Activity> {
        if self.activities.is_empty() {
            return None;
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % self.activities.len();
        self.activities.get(index)
    }
}

/// Sets the bot's presence to the next activity every 45 seconds.
pub struct CyclingActivityService {
    gateway: Arc<SimulatedGateway>,
    rotation: Arc<ActivityRotation>,
}

impl FromServices for CyclingActivityService {
    fn from_services(services: &ServiceProvider) -> Result<Self, BoxError> {
        Ok(Self {
            gateway: services.resolve()?,
            rotation: services.resolve()?,
        })
    }
}

#[async_trait]
impl ScheduledTask for CyclingActivityService {
    fn interval(&self) -> Duration {
        Duration::from_secs(45)
    }

    async fn is_runnable(&self) -> Result<bool, BoxError> {
        Ok(self.gateway.is_connected())
    }

    async fn invoke(&self) -> Result<(), BoxError> {
        let Some(activity) = self.rotation.next() else {
            return Ok(());
        };
        debug!(previous = ?self.gateway.presence(), "Rotating activity");
        info!(source = "CyclingActivity", "Setting activity to: {activity}");
        self.gateway.set_presence(activity.clone()).await
    }
}

register_service!(CyclingActivityService, scheduled);

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let mut base = ServiceCollection::new();
    base.add_instance(Arc::new(ActivityRotation::new(vec![
        Activity::new("ready to serve you!", ActivityKind::Playing),
        Activity::new("cool tunes", ActivityKind::Listening),
        Activity::new("Half-Life 3 Closed Alpha", ActivityKind::Playing),
    ])));

    let runtime = HeraldRuntime::builder()
        .search_path(env!("CARGO_MANIFEST_DIR"))
        .services(base)
        .build()?;

    let gateway = Arc::new(SimulatedGateway::with_demo_timeline());
    runtime.run(gateway).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_cycles_in_order() {
        let rotation = ActivityRotation::new(vec![
            Activity::new("a", ActivityKind::Playing),
            Activity::new("b", ActivityKind::Watching),
        ]);
        let names: Vec<_> = (0..3)
            .filter_map(|_| rotation.next().map(|a| a.name.clone()))
            .collect();
        assert_eq!(names, ["a", "b", "a"]);
    }

    #[test]
    fn test_empty_rotation() {
        assert!(ActivityRotation::new(Vec::new()).next().is_none());
    }
}
