//! Startup steps shared by every runtime flavour.
//!
//! Both run strictly in registration order. Initializers are awaited one at
//! a time, so a slow initializer delays every one after it.

use std::sync::Arc;

use herald_core::{LogSink, ServiceError, ServiceProvider, Severity};
use tracing::{Instrument, debug, info_span};

use crate::error::{InitializationError, StartupError};
use crate::scheduler::{ScheduleHandle, Scheduler};

/// Calls [`Service::initialize`](herald_core::Service::initialize) on every
/// initializable service and logs "Service initialized." for each.
///
/// Stops at the first failure. Returns the number of services initialized.
pub async fn initialize_services(
    provider: &ServiceProvider,
    sink: &dyn LogSink,
) -> Result<usize, StartupError> {
    let services = provider.initializers()?;
    let count = services.len();
    for (name, service) in services {
        service
            .initialize()
            .instrument(info_span!("initialize", service = name))
            .await
            .map_err(|source| InitializationError {
                service: name,
                source,
            })?;
        sink.log(name, Severity::Information, "Service initialized.", None);
    }
    Ok(count)
}

/// Starts every scheduled service.
pub fn start_schedules(
    provider: &ServiceProvider,
    sink: Arc<dyn LogSink>,
) -> Result<Vec<ScheduleHandle>, ServiceError> {
    let handles: Vec<_> = provider
        .scheduled_tasks()?
        .into_iter()
        .map(|(name, task)| {
            debug!(task = name, interval = ?task.interval(), "Starting schedule");
            Scheduler::start(name, task, Arc::clone(&sink))
        })
        .collect();
    Ok(handles)
}

/// Stops every schedule and waits for the loops to exit.
pub async fn stop_schedules(handles: Vec<ScheduleHandle>) {
    for handle in &handles {
        handle.stop();
    }
    for handle in handles {
        handle.join().await;
    }
}
