use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use convoy_records::MemoryBackend;
use convoy_scheduler::{
    RecordScheduleStore, Schedule, ScheduleExecutor, ScheduleFilter, ScheduleService,
    ScheduleStatus, ScheduleStore, SchedulerError, StoreLayout,
};
use convoy_sessions::{CreateSessionRequest, Session, SessionManager, SessionStatus};

struct AlwaysCreates;

#[async_trait]
impl SessionManager for AlwaysCreates {
    async fn create_session(
        &self,
        id: &str,
        _request: &CreateSessionRequest,
    ) -> convoy_sessions::Result<Session> {
        Ok(Session::new(id, SessionStatus::Creating))
    }

    async fn get_session(&self, _id: &str) -> Option<Session> {
        None
    }

    async fn delete_session(&self, _id: &str) -> convoy_sessions::Result<()> {
        Ok(())
    }
}

fn service_with_store() -> (Arc<RecordScheduleStore>, ScheduleService) {
    let store = Arc::new(RecordScheduleStore::new(
        Arc::new(MemoryBackend::new()),
        StoreLayout::default(),
    ));
    let executor = Arc::new(ScheduleExecutor::new(store.clone(), Arc::new(AlwaysCreates)));
    let svc = ScheduleService::new(store.clone(), executor);
    (store, svc)
}

fn service() -> ScheduleService {
    service_with_store().1
}

#[tokio::test]
async fn create_assigns_id_and_next_execution() {
    let svc = service();
    let created = svc
        .create(Schedule::new("", "hourly", "alice").with_cron("0 * * * *", "Europe/Berlin"))
        .await
        .unwrap();

    assert!(!created.id.is_empty());
    assert_eq!(created.status, ScheduleStatus::Active);
    let next = created.next_execution_at.unwrap();
    assert!(next > Utc::now());
    assert!(next <= Utc::now() + Duration::hours(1));
    assert_eq!(svc.get(&created.id).await.unwrap(), created);
}

#[tokio::test]
async fn create_resets_runtime_fields() {
    let svc = service();
    let at = Utc::now() + Duration::days(1);
    let mut s = Schedule::new("once", "tomorrow", "alice").with_scheduled_at(at);
    s.execution_count = 7;
    s.next_execution_at = Some(Utc::now() - Duration::days(3));

    let created = svc.create(s).await.unwrap();
    assert_eq!(created.execution_count, 0);
    assert_eq!(created.next_execution_at, Some(at));
}

#[tokio::test]
async fn create_rejects_completed_and_invalid_schedules() {
    let svc = service();
    let mut done = Schedule::new("x", "done", "alice").with_cron("0 * * * *", "");
    done.status = ScheduleStatus::Completed;
    assert!(matches!(
        svc.create(done).await.unwrap_err(),
        SchedulerError::InvalidSchedule { .. }
    ));

    let bad = Schedule::new("y", "bad", "alice").with_cron("every day", "");
    assert!(matches!(
        svc.create(bad).await.unwrap_err(),
        SchedulerError::InvalidSchedule { .. }
    ));
}

#[tokio::test]
async fn update_recomputes_next_only_when_timing_changes() {
    let svc = service();
    let created = svc
        .create(Schedule::new("daily", "daily", "alice").with_cron("0 9 * * *", ""))
        .await
        .unwrap();

    let mut renamed = created.clone();
    renamed.name = "morning".into();
    renamed.next_execution_at = None;
    let updated = svc.update(renamed).await.unwrap();
    assert_eq!(updated.name, "morning");
    assert_eq!(updated.next_execution_at, created.next_execution_at);

    let mut retimed = updated.clone();
    retimed.cron_expr = "*/5 * * * *".into();
    let updated = svc.update(retimed).await.unwrap();
    let next = updated.next_execution_at.unwrap();
    assert!(next <= Utc::now() + Duration::minutes(5));
}

#[tokio::test]
async fn pause_and_resume() {
    let svc = service();
    svc.create(Schedule::new("poll", "poll", "alice").with_cron("*/5 * * * *", ""))
        .await
        .unwrap();

    let paused = svc.pause("poll").await.unwrap();
    assert_eq!(paused.status, ScheduleStatus::Paused);
    assert_eq!(svc.pause("poll").await.unwrap().status, ScheduleStatus::Paused);

    let paused_only = ScheduleFilter {
        status: Some(ScheduleStatus::Paused),
        ..Default::default()
    };
    assert_eq!(svc.list(&paused_only).await.unwrap().len(), 1);

    let resumed = svc.resume("poll").await.unwrap();
    assert_eq!(resumed.status, ScheduleStatus::Active);
    assert!(resumed.next_execution_at.unwrap() > Utc::now());
}

#[tokio::test]
async fn completed_schedules_cannot_be_paused_or_resumed() {
    let (store, svc) = service_with_store();
    let at = Utc::now() + Duration::hours(1);
    svc.create(Schedule::new("once", "once", "alice").with_scheduled_at(at))
        .await
        .unwrap();

    // status is not editable through the service; the worker completes via the store
    let mut done = store.get("once").await.unwrap();
    done.status = ScheduleStatus::Completed;
    store.update(done).await.unwrap();

    assert!(matches!(
        svc.resume("once").await.unwrap_err(),
        SchedulerError::InvalidSchedule { field, .. } if field == "status"
    ));
    assert!(matches!(
        svc.pause("once").await.unwrap_err(),
        SchedulerError::InvalidSchedule { field, .. } if field == "status"
    ));
    assert!(svc.resume("ghost").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn trigger_and_delete() {
    let svc = service();
    svc.create(Schedule::new("poll", "poll", "alice").with_cron("*/5 * * * *", ""))
        .await
        .unwrap();

    let record = svc.trigger("poll").await.unwrap();
    assert!(record.session_id.is_some());
    assert_eq!(svc.get("poll").await.unwrap().execution_count, 1);

    svc.delete("poll").await.unwrap();
    assert!(svc.get("poll").await.unwrap_err().is_not_found());
}
