use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::cron::{calculate_next_execution, validate_timing};
use crate::error::{Result, SchedulerError};
use crate::executor::ScheduleExecutor;
use crate::store::ScheduleStore;
use crate::types::{ExecutionRecord, Schedule, ScheduleFilter, ScheduleStatus};

/// Entry point for callers that manage schedules (HTTP handlers, CLI).
///
/// Owns the rules that sit above raw persistence: id assignment, keeping
/// `next_execution_at` in step with timing and status changes.
#[derive(Clone)]
pub struct ScheduleService {
    store: Arc<dyn ScheduleStore>,
    executor: Arc<ScheduleExecutor>,
}

impl ScheduleService {
    pub fn new(store: Arc<dyn ScheduleStore>, executor: Arc<ScheduleExecutor>) -> Self {
        Self { store, executor }
    }

    /// Persist a new schedule. An empty id is replaced with a fresh UUID;
    /// runtime fields are reset.
    pub async fn create(&self, mut schedule: Schedule) -> Result<Schedule> {
        if schedule.id.is_empty() {
            schedule.id = Uuid::new_v4().to_string();
        }
        if schedule.status == ScheduleStatus::Completed {
            return Err(SchedulerError::invalid("status", "cannot create a completed schedule"));
        }
        schedule.validate()?;
        validate_timing(&schedule)?;

        schedule.last_execution = None;
        schedule.execution_count = 0;
        schedule.next_execution_at = calculate_next_execution(&schedule, Utc::now())?;

        let created = self.store.create(schedule).await?;
        info!(schedule_id = %created.id, next = ?created.next_execution_at, "schedule registered");
        Ok(created)
    }

    /// Replace the user-editable parts of a schedule. Runtime fields are kept
    /// from the stored copy; the next execution is recomputed only when
    /// `scheduled_at`, `cron_expr` or `timezone` changed.
    pub async fn update(&self, mut schedule: Schedule) -> Result<Schedule> {
        let existing = self.store.get(&schedule.id).await?;
        validate_timing(&schedule)?;

        schedule.status = existing.status;
        schedule.last_execution = existing.last_execution.clone();
        schedule.execution_count = existing.execution_count;

        let timing_changed = schedule.scheduled_at != existing.scheduled_at
            || schedule.cron_expr != existing.cron_expr
            || schedule.timezone != existing.timezone;
        let recompute = timing_changed && existing.status != ScheduleStatus::Completed;
        schedule.next_execution_at = if recompute {
            calculate_next_execution(&schedule, Utc::now())?
        } else {
            existing.next_execution_at
        };

        self.store.update(schedule).await
    }

    pub async fn pause(&self, id: &str) -> Result<Schedule> {
        let mut schedule = self.store.get(id).await?;
        match schedule.status {
            ScheduleStatus::Paused => return Ok(schedule),
            ScheduleStatus::Completed => {
                return Err(SchedulerError::invalid(
                    "status",
                    "completed schedules cannot be paused",
                ));
            }
            ScheduleStatus::Active => {}
        }
        schedule.status = ScheduleStatus::Paused;
        let paused = self.store.update(schedule).await?;
        info!(schedule_id = %id, "schedule paused");
        Ok(paused)
    }

    /// Reactivate a paused schedule. The next execution is computed from now,
    /// so runs missed while paused are not replayed.
    pub async fn resume(&self, id: &str) -> Result<Schedule> {
        let mut schedule = self.store.get(id).await?;
        match schedule.status {
            ScheduleStatus::Active => return Ok(schedule),
            ScheduleStatus::Completed => {
                return Err(SchedulerError::invalid(
                    "status",
                    "completed schedules cannot be resumed",
                ));
            }
            ScheduleStatus::Paused => {}
        }
        schedule.status = ScheduleStatus::Active;
        schedule.next_execution_at = calculate_next_execution(&schedule, Utc::now())?;
        let resumed = self.store.update(schedule).await?;
        info!(schedule_id = %id, next = ?resumed.next_execution_at, "schedule resumed");
        Ok(resumed)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.store.delete(id).await
    }

    pub async fn get(&self, id: &str) -> Result<Schedule> {
        self.store.get(id).await
    }

    pub async fn list(&self, filter: &ScheduleFilter) -> Result<Vec<Schedule>> {
        self.store.list(filter).await
    }

    /// See [`ScheduleExecutor::trigger`].
    pub async fn trigger(&self, id: &str) -> Result<ExecutionRecord> {
        self.executor.trigger(id).await
    }
}
