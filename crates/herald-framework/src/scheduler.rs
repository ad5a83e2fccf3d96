//! Scheduled-task runner.
//!
//! Each schedule is one tokio task looping `Waiting → Running → Waiting`.
//! A tick evaluates the gate and, if it allows, the body; whatever happens
//! in the tick, the schedule re-arms with the same interval. The loop only
//! ends through [`ScheduleHandle::stop`].
//!
//! ```rust,ignore
//! let handle = Scheduler::start("CyclingActivity", task, sink);
//! // ...
//! handle.stop();
//! handle.join().await;
//! ```

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use herald_core::{BoxError, LogSink, PanicError, ScheduledTask, Severity};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, debug_span, trace};

/// Message logged for every failed tick.
pub const TASK_FAILED_MESSAGE: &str = "An exception occurred running a scheduled task.";

/// Where a schedule currently is in its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskState {
    /// Started but not yet polled.
    Idle = 0,
    /// Sleeping until the next tick.
    Waiting = 1,
    /// Evaluating the gate or running the body.
    Running = 2,
    /// Stopped; will never tick again.
    Stopped = 3,
}

impl TaskState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => TaskState::Idle,
            1 => TaskState::Waiting,
            2 => TaskState::Running,
            _ => TaskState::Stopped,
        }
    }
}

/// Control handle for one running schedule.
///
/// Dropping the handle does not stop the schedule.
#[derive(Debug)]
pub struct ScheduleHandle {
    name: Arc<str>,
    state: Arc<AtomicU8>,
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl ScheduleHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Requests the schedule to stop. A tick already running finishes first;
    /// a pending sleep is cut short.
    pub fn stop(&self) {
        self.token.cancel();
    }

    pub fn is_stopping(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Waits for the loop to exit. Call [`stop`](Self::stop) first, otherwise
    /// this never returns.
    pub async fn join(self) {
        if let Err(e) = self.task.await
            && e.is_panic()
        {
            tracing::error!(task = %self.name, "Schedule loop panicked");
        }
    }
}

/// Starts schedules.
pub struct Scheduler;

impl Scheduler {
    /// Runs `task` every [`interval`](ScheduledTask::interval) until stopped.
    ///
    /// Gate and body failures (errors or panics) are logged to `sink` with
    /// `name` as the source and never end the schedule.
    pub fn start(
        name: impl Into<Arc<str>>,
        task: Arc<dyn ScheduledTask>,
        sink: Arc<dyn LogSink>,
    ) -> ScheduleHandle {
        let name = name.into();
        let state = Arc::new(AtomicU8::new(TaskState::Idle as u8));
        let token = CancellationToken::new();

        let span = debug_span!("schedule", task = %name);
        let task = tokio::spawn(
            run_schedule(
                Arc::clone(&name),
                task,
                sink,
                Arc::clone(&state),
                token.clone(),
            )
            .instrument(span),
        );

        ScheduleHandle {
            name,
            state,
            token,
            task,
        }
    }

    /// Closure form of [`start`](Self::start).
    pub fn start_fn<G, GF, B, BF>(
        name: impl Into<Arc<str>>,
        interval: Duration,
        gate: G,
        body: B,
        sink: Arc<dyn LogSink>,
    ) -> ScheduleHandle
    where
        G: Fn() -> GF + Send + Sync + 'static,
        GF: Future<Output = Result<bool, BoxError>> + Send + 'static,
        B: Fn() -> BF + Send + Sync + 'static,
        BF: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self::start(name, Arc::new(FnTask { interval, gate, body }), sink)
    }
}

struct FnTask<G, B> {
    interval: Duration,
    gate: G,
    body: B,
}

#[async_trait]
impl<G, GF, B, BF> ScheduledTask for FnTask<G, B>
where
    G: Fn() -> GF + Send + Sync + 'static,
    GF: Future<Output = Result<bool, BoxError>> + Send + 'static,
    B: Fn() -> BF + Send + Sync + 'static,
    BF: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    fn interval(&self) -> Duration {
        self.interval
    }

    async fn is_runnable(&self) -> Result<bool, BoxError> {
        (self.gate)().await
    }

    async fn invoke(&self) -> Result<(), BoxError> {
        (self.body)().await
    }
}

async fn run_schedule(
    name: Arc<str>,
    task: Arc<dyn ScheduledTask>,
    sink: Arc<dyn LogSink>,
    state: Arc<AtomicU8>,
    token: CancellationToken,
) {
    debug!("Schedule started");
    loop {
        state.store(TaskState::Waiting as u8, Ordering::Release);
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = tokio::time::sleep(task.interval()) => {}
        }

        state.store(TaskState::Running as u8, Ordering::Release);
        if let Err(error) = tick(task.as_ref()).await {
            sink.log(&name, Severity::Error, TASK_FAILED_MESSAGE, Some(&*error));
        }
    }
    state.store(TaskState::Stopped as u8, Ordering::Release);
    debug!("Schedule stopped");
}

/// One gate-then-body pass. `Ok` covers both a completed body and a skipped
/// tick.
async fn tick(task: &dyn ScheduledTask) -> Result<(), BoxError> {
    let runnable = AssertUnwindSafe(task.is_runnable())
        .catch_unwind()
        .await
        .map_err(|panic| Box::new(PanicError::from_payload(panic)) as BoxError)??;
    if !runnable {
        trace!("Gate closed, skipping tick");
        return Ok(());
    }

    AssertUnwindSafe(task.invoke())
        .catch_unwind()
        .await
        .map_err(|panic| Box::new(PanicError::from_payload(panic)) as BoxError)?
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use herald_core::RecordingSink;

    use super::*;

    const INTERVAL: Duration = Duration::from_secs(10);

    fn sink() -> Arc<RecordingSink> {
        Arc::new(RecordingSink::new())
    }

    #[tokio::test(start_paused = true)]
    async fn test_alternating_gate_runs_body_on_true_ticks_only() {
        let sink = sink();
        let gates = Arc::new(AtomicUsize::new(0));
        let bodies = Arc::new(AtomicUsize::new(0));

        let handle = Scheduler::start_fn(
            "alternating",
            INTERVAL,
            {
                let gates = Arc::clone(&gates);
                move || {
                    let n = gates.fetch_add(1, Ordering::SeqCst);
                    async move { Ok::<_, BoxError>(n % 2 == 0) }
                }
            },
            {
                let bodies = Arc::clone(&bodies);
                move || {
                    bodies.fetch_add(1, Ordering::SeqCst);
                    async { Err::<(), BoxError>("body failed".into()) }
                }
            },
            sink.clone(),
        );

        // ticks at 10s, 20s, 30s, 40s, 50s, 60s
        tokio::time::sleep(Duration::from_secs(65)).await;

        assert_eq!(gates.load(Ordering::SeqCst), 6);
        assert_eq!(bodies.load(Ordering::SeqCst), 3);

        let errors = sink.at(Severity::Error);
        assert_eq!(errors.len(), 3);
        assert!(errors.iter().all(|e| e.source == "alternating"));
        assert!(errors.iter().all(|e| e.message == TASK_FAILED_MESSAGE));
        assert_eq!(handle.state(), TaskState::Waiting);

        handle.stop();
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_gate_failure_and_panic_do_not_stop_schedule() {
        let sink = sink();
        let ticks = Arc::new(AtomicUsize::new(0));

        let handle = Scheduler::start_fn(
            "flaky",
            INTERVAL,
            {
                let ticks = Arc::clone(&ticks);
                move || {
                    let n = ticks.fetch_add(1, Ordering::SeqCst);
                    async move {
                        match n {
                            0 => Err::<bool, BoxError>("gate failed".into()),
                            1 => panic!("gate panicked"),
                            _ => Ok(true),
                        }
                    }
                }
            },
            || async { Ok::<_, BoxError>(()) },
            sink.clone(),
        );

        tokio::time::sleep(Duration::from_secs(35)).await;

        assert_eq!(ticks.load(Ordering::SeqCst), 3);
        let errors: Vec<_> = sink
            .at(Severity::Error)
            .into_iter()
            .filter_map(|e| e.error)
            .collect();
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("gate failed"));
        assert!(errors[1].contains("gate panicked"));

        handle.stop();
        handle.join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_before_first_tick() {
        let sink = sink();
        let bodies = Arc::new(AtomicUsize::new(0));

        let handle = Scheduler::start_fn(
            "stopped",
            INTERVAL,
            || async { Ok::<_, BoxError>(true) },
            {
                let bodies = Arc::clone(&bodies);
                move || {
                    bodies.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<_, BoxError>(()) }
                }
            },
            sink.clone(),
        );

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(handle.state(), TaskState::Waiting);

        handle.stop();
        assert!(handle.is_stopping());
        let state = Arc::clone(&handle.state);
        handle.join().await;

        assert_eq!(
            TaskState::from_u8(state.load(Ordering::Acquire)),
            TaskState::Stopped
        );
        assert_eq!(bodies.load(Ordering::SeqCst), 0);
        assert!(sink.entries().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_independent_schedules() {
        let sink = sink();
        let fast = Arc::new(AtomicUsize::new(0));

        let failing = Scheduler::start_fn(
            "failing",
            Duration::from_secs(1),
            || async { Ok::<_, BoxError>(true) },
            || async { Err::<(), BoxError>("always".into()) },
            sink.clone(),
        );
        let counting = Scheduler::start_fn(
            "counting",
            Duration::from_secs(3),
            || async { Ok::<_, BoxError>(true) },
            {
                let fast = Arc::clone(&fast);
                move || {
                    fast.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<_, BoxError>(()) }
                }
            },
            sink.clone(),
        );

        tokio::time::sleep(Duration::from_millis(9500)).await;

        assert_eq!(fast.load(Ordering::SeqCst), 3);
        assert!(
            sink.at(Severity::Error)
                .iter()
                .all(|e| e.source == "failing")
        );

        for handle in [failing, counting] {
            handle.stop();
            handle.join().await;
        }
    }
}
