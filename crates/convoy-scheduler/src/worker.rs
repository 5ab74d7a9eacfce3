use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::executor::ScheduleExecutor;
use crate::store::ScheduleStore;
use crate::types::ExecutionStatus;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Time between passes over the store.
    pub check_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(30),
        }
    }
}

/// Counts for one pass over the due schedules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub due: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Schedules whose outcome could not be persisted.
    pub errors: usize,
}

struct RunningLoop {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Periodic loop that executes due schedules.
///
/// `start` and `stop` are idempotent and may be called from different tasks;
/// only one loop runs per worker at a time.
pub struct Worker {
    store: Arc<dyn ScheduleStore>,
    executor: Arc<ScheduleExecutor>,
    config: WorkerConfig,
    state: Mutex<Option<RunningLoop>>,
}

impl Worker {
    pub fn new(
        store: Arc<dyn ScheduleStore>,
        executor: Arc<ScheduleExecutor>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            store,
            executor,
            config,
            state: Mutex::new(None),
        }
    }

    /// Spawn the loop. A no-op while a loop is already running.
    ///
    /// The loop ends on [`Worker::stop`] or when `cancel` fires.
    pub fn start(&self, cancel: CancellationToken) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if state.as_ref().is_some_and(|running| !running.handle.is_finished()) {
            debug!("worker already running");
            return;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let store = Arc::clone(&self.store);
        let executor = Arc::clone(&self.executor);
        let period = self.config.check_interval;
        let handle = tokio::spawn(run_loop(store, executor, period, stop_rx, cancel));

        info!(interval_secs = period.as_secs(), "schedule worker started");
        *state = Some(RunningLoop { stop_tx, handle });
    }

    /// Signal the loop and wait for it to exit. A no-op when stopped.
    pub async fn stop(&self) {
        let running = self
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(running) = running else {
            return;
        };

        let _ = running.stop_tx.send(true);
        if let Err(e) = running.handle.await {
            error!(error = %e, "schedule worker task failed");
        }
        info!("schedule worker stopped");
    }

    pub fn is_running(&self) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|running| !running.handle.is_finished())
    }

    /// Execute everything due at `now` once, outside the loop.
    pub async fn run_pass(&self, now: DateTime<Utc>) -> PassSummary {
        run_pass(self.store.as_ref(), &self.executor, now).await
    }
}

async fn run_loop(
    store: Arc<dyn ScheduleStore>,
    executor: Arc<ScheduleExecutor>,
    period: Duration,
    mut stop_rx: watch::Receiver<bool>,
    cancel: CancellationToken,
) {
    // First tick completes immediately.
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("worker cancelled");
                break;
            }
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
            _ = interval.tick() => {
                let summary = run_pass(store.as_ref(), &executor, Utc::now()).await;
                if summary.due > 0 {
                    info!(
                        due = summary.due,
                        succeeded = summary.succeeded,
                        failed = summary.failed,
                        skipped = summary.skipped,
                        errors = summary.errors,
                        "schedule pass finished"
                    );
                }
            }
        }
    }
}

/// A pass that has started always runs to the end, even if leadership is
/// lost meanwhile; the loop only stops between passes.
async fn run_pass(
    store: &dyn ScheduleStore,
    executor: &ScheduleExecutor,
    now: DateTime<Utc>,
) -> PassSummary {
    let mut summary = PassSummary::default();

    let due = match store.get_due_schedules(now).await {
        Ok(due) => due,
        Err(e) => {
            error!(error = %e, "failed to load due schedules");
            summary.errors += 1;
            return summary;
        }
    };
    summary.due = due.len();

    for schedule in &due {
        match executor.execute(schedule, now).await {
            Ok(record) => match record.status {
                ExecutionStatus::Success => summary.succeeded += 1,
                ExecutionStatus::Failed => summary.failed += 1,
                ExecutionStatus::Skipped => summary.skipped += 1,
            },
            Err(e) => {
                error!(schedule_id = %schedule.id, error = %e, "failed to execute schedule");
                summary.errors += 1;
            }
        }
    }
    summary
}
