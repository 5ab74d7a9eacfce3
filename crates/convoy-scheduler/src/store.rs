use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use convoy_core::config::StoreConfig;
use convoy_records::{sanitize_label_value, Record, RecordBackend};
use sha2::{Digest, Sha256};

use crate::cron::validate_timing;
use crate::error::{Result, SchedulerError};
use crate::types::{ExecutionRecord, Schedule, ScheduleFilter, ScheduleStatus, Scope};

const RECORD_STEM_LEN: usize = 40;
const RECORD_DIGEST_LEN: usize = 16;

/// Persistence contract for schedules, shared by the worker and the
/// request-handling layer.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Persist a new schedule, stamping `created_at`/`updated_at`.
    async fn create(&self, schedule: Schedule) -> Result<Schedule>;

    async fn get(&self, id: &str) -> Result<Schedule>;

    async fn list(&self, filter: &ScheduleFilter) -> Result<Vec<Schedule>>;

    /// Replace a stored schedule wholesale; `created_at` is preserved.
    async fn update(&self, schedule: Schedule) -> Result<Schedule>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// Every schedule for which [`Schedule::is_due`] holds at `now`.
    async fn get_due_schedules(&self, now: DateTime<Utc>) -> Result<Vec<Schedule>>;

    /// Overwrite `last_execution` and bump `execution_count`.
    async fn record_execution(&self, id: &str, record: ExecutionRecord) -> Result<()>;

    async fn update_next_execution(&self, id: &str, next: DateTime<Utc>) -> Result<()>;

    /// Record a successful final execution and mark the schedule completed,
    /// in a single write.
    async fn complete_with_execution(&self, id: &str, record: ExecutionRecord) -> Result<()>;
}

/// Names and label keys used to lay schedules out in a record backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    pub record_prefix: String,
    pub legacy_record_name: String,
    pub label_is_schedule: String,
    pub label_id: String,
    pub label_scope: String,
    pub label_user_id: String,
    pub label_team_id: String,
}

impl Default for StoreLayout {
    fn default() -> Self {
        Self::from(&StoreConfig::default())
    }
}

impl From<&StoreConfig> for StoreLayout {
    fn from(config: &StoreConfig) -> Self {
        Self {
            record_prefix: config.record_prefix.clone(),
            legacy_record_name: config.legacy_record_name.clone(),
            label_is_schedule: "is-schedule".to_string(),
            label_id: "schedule-id".to_string(),
            label_scope: "schedule-scope".to_string(),
            label_user_id: "schedule-user-id".to_string(),
            label_team_id: "schedule-team-id".to_string(),
        }
    }
}

/// Counts from one legacy migration run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Per-schedule records written by this run.
    pub migrated: usize,
    /// Legacy entries whose record already existed.
    pub skipped: usize,
    /// Legacy entries that failed validation.
    pub invalid: usize,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LegacyPayload {
    List(Vec<Schedule>),
    Wrapped { schedules: Vec<Schedule> },
}

/// [`ScheduleStore`] over a label-indexed record backend.
///
/// One record per schedule. `list` issues a single backend query for the
/// `is-schedule` label and applies every filter in memory: backends only
/// need exact-match label listing, at the cost of reading all schedules.
/// Writes are read-modify-write without a concurrency token; cross-replica
/// serialization is left to leader election.
pub struct RecordScheduleStore {
    backend: Arc<dyn RecordBackend>,
    layout: StoreLayout,
    lock: RwLock<()>,
}

impl RecordScheduleStore {
    pub fn new(backend: Arc<dyn RecordBackend>, layout: StoreLayout) -> Self {
        Self {
            backend,
            layout,
            lock: RwLock::new(()),
        }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Deterministic record key for a schedule ID.
    ///
    /// A readable sanitized stem followed by a digest of the raw ID, so IDs
    /// that differ only in case, punctuation or beyond the stem length never
    /// share a record.
    pub fn record_name(&self, id: &str) -> Result<String> {
        if id.is_empty() {
            return Err(SchedulerError::invalid("id", "id is required"));
        }
        let digest = hex::encode(Sha256::digest(id.as_bytes()));
        let digest = &digest[..RECORD_DIGEST_LEN];

        let stem: String = sanitize_label_value(id).chars().take(RECORD_STEM_LEN).collect();
        let stem = stem.trim_end_matches(|c: char| !c.is_ascii_alphanumeric());
        let prefix = &self.layout.record_prefix;
        if stem.is_empty() {
            Ok(format!("{prefix}{digest}"))
        } else {
            Ok(format!("{prefix}{stem}-{digest}"))
        }
    }

    fn encode(&self, schedule: &Schedule) -> Result<Record> {
        let l = &self.layout;
        let name = self.record_name(&schedule.id)?;
        let mut record = Record::new(name, serde_json::to_string(schedule)?)
            .with_label(&l.label_is_schedule, "true")
            .with_label(&l.label_id, sanitize_label_value(&schedule.id))
            .with_label(&l.label_scope, schedule.scope.as_str())
            .with_label(&l.label_user_id, sanitize_label_value(&schedule.user_id));
        if schedule.scope == Scope::Team {
            if let Some(team) = &schedule.team_id {
                record = record.with_label(&l.label_team_id, sanitize_label_value(team));
            }
        }
        Ok(record)
    }

    fn decode(record: &Record) -> Result<Schedule> {
        Ok(serde_json::from_str(&record.data)?)
    }

    async fn load(&self, id: &str, op: &'static str) -> Result<Schedule> {
        let name = self.record_name(id)?;
        let record = self
            .backend
            .get(&name)
            .await
            .map_err(SchedulerError::backend(op))?
            .ok_or_else(|| SchedulerError::ScheduleNotFound { id: id.to_string() })?;
        let schedule = Self::decode(&record)?;
        // a digest collision must not hand out someone else's schedule
        if schedule.id != id {
            warn!(requested = %id, stored = %schedule.id, record = %name, "record key collision");
            return Err(SchedulerError::ScheduleNotFound { id: id.to_string() });
        }
        Ok(schedule)
    }

    /// Write with create-if-absent semantics: try `create`, fall back to
    /// `update` when the record already exists.
    async fn put(&self, schedule: &Schedule, op: &'static str) -> Result<()> {
        let record = self.encode(schedule)?;
        match self.backend.create(&record).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_already_exists() => self
                .backend
                .update(&record)
                .await
                .map_err(SchedulerError::backend(op)),
            Err(e) => Err(SchedulerError::backend(op)(e)),
        }
    }

    /// Read-modify-write of one schedule under the write lock.
    async fn modify<F>(&self, id: &str, op: &'static str, mutate: F) -> Result<()>
    where
        F: FnOnce(&mut Schedule) + Send,
    {
        let _guard = self.lock.write().await;
        let mut schedule = self.load(id, op).await?;
        mutate(&mut schedule);
        schedule.updated_at = Utc::now();
        self.put(&schedule, op).await
    }

    async fn list_all(&self) -> Result<Vec<Schedule>> {
        let records = self
            .backend
            .list_by_label(&self.layout.label_is_schedule, "true")
            .await
            .map_err(SchedulerError::backend("list"))?;

        let mut schedules: Vec<Schedule> = records
            .iter()
            .filter_map(|record| match Self::decode(record) {
                Ok(s) => Some(s),
                Err(e) => {
                    warn!(
                        record = %record.name,
                        error = %e,
                        "skipping undecodable schedule record"
                    );
                    None
                }
            })
            .collect();
        schedules.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(schedules)
    }

    /// Copy schedules out of the single legacy record into per-schedule
    /// records. Existing records are never overwritten and the legacy record
    /// is left in place, so running this again is a no-op.
    #[instrument(skip(self), fields(legacy = %self.layout.legacy_record_name))]
    pub async fn migrate_from_legacy(&self) -> Result<MigrationReport> {
        let _guard = self.lock.write().await;
        let mut report = MigrationReport::default();

        let Some(legacy) = self
            .backend
            .get(&self.layout.legacy_record_name)
            .await
            .map_err(SchedulerError::backend("migrate"))?
        else {
            debug!("no legacy schedule record, nothing to migrate");
            return Ok(report);
        };

        let schedules = match serde_json::from_str::<LegacyPayload>(&legacy.data)? {
            LegacyPayload::List(list) | LegacyPayload::Wrapped { schedules: list } => list,
        };

        let now = Utc::now();
        for mut schedule in schedules {
            if let Err(e) = schedule.validate() {
                warn!(
                    schedule_id = %schedule.id,
                    error = %e,
                    "legacy schedule is invalid, not migrated"
                );
                report.invalid += 1;
                continue;
            }
            let record = match self.encode(&schedule) {
                Ok(r) => r,
                Err(e) => {
                    warn!(
                        schedule_id = %schedule.id,
                        error = %e,
                        "legacy schedule is invalid, not migrated"
                    );
                    report.invalid += 1;
                    continue;
                }
            };
            let exists = self
                .backend
                .get(&record.name)
                .await
                .map_err(SchedulerError::backend("migrate"))?
                .is_some();
            if exists {
                report.skipped += 1;
                continue;
            }

            if schedule.created_at == DateTime::<Utc>::default() {
                schedule.created_at = now;
            }
            if schedule.updated_at == DateTime::<Utc>::default() {
                schedule.updated_at = now;
            }
            match self.backend.create(&self.encode(&schedule)?).await {
                Ok(()) => report.migrated += 1,
                // written concurrently by another replica
                Err(e) if e.is_already_exists() => report.skipped += 1,
                Err(e) => return Err(SchedulerError::backend("migrate")(e)),
            }
        }

        info!(
            migrated = report.migrated,
            skipped = report.skipped,
            invalid = report.invalid,
            "legacy schedule migration finished"
        );
        Ok(report)
    }
}

#[async_trait]
impl ScheduleStore for RecordScheduleStore {
    #[instrument(skip(self, schedule), fields(schedule_id = %schedule.id))]
    async fn create(&self, mut schedule: Schedule) -> Result<Schedule> {
        schedule.validate()?;
        schedule.validate_ownership()?;
        validate_timing(&schedule)?;

        let _guard = self.lock.write().await;
        let name = self.record_name(&schedule.id)?;
        let exists = self
            .backend
            .get(&name)
            .await
            .map_err(SchedulerError::backend("create"))?
            .is_some();
        if exists {
            return Err(SchedulerError::AlreadyExists { id: schedule.id });
        }

        let now = Utc::now();
        schedule.created_at = now;
        schedule.updated_at = now;
        let record = self.encode(&schedule)?;
        match self.backend.create(&record).await {
            Ok(()) => {}
            Err(e) if e.is_already_exists() => {
                return Err(SchedulerError::AlreadyExists { id: schedule.id })
            }
            Err(e) => return Err(SchedulerError::backend("create")(e)),
        }
        info!(name = %schedule.name, user_id = %schedule.user_id, "schedule created");
        Ok(schedule)
    }

    async fn get(&self, id: &str) -> Result<Schedule> {
        let _guard = self.lock.read().await;
        self.load(id, "get").await
    }

    async fn list(&self, filter: &ScheduleFilter) -> Result<Vec<Schedule>> {
        let _guard = self.lock.read().await;
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .filter(|s| filter.matches(s))
            .collect())
    }

    #[instrument(skip(self, schedule), fields(schedule_id = %schedule.id))]
    async fn update(&self, mut schedule: Schedule) -> Result<Schedule> {
        schedule.validate()?;
        schedule.validate_ownership()?;
        validate_timing(&schedule)?;

        let _guard = self.lock.write().await;
        let existing = self.load(&schedule.id, "update").await?;
        schedule.created_at = existing.created_at;
        schedule.updated_at = Utc::now();
        self.put(&schedule, "update").await?;
        debug!(status = %schedule.status, "schedule updated");
        Ok(schedule)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: &str) -> Result<()> {
        let _guard = self.lock.write().await;
        self.load(id, "delete").await?;
        let name = self.record_name(id)?;
        match self.backend.delete(&name).await {
            Ok(()) => {
                info!("schedule deleted");
                Ok(())
            }
            Err(e) if e.is_not_found() => Err(SchedulerError::ScheduleNotFound {
                id: id.to_string(),
            }),
            Err(e) => Err(SchedulerError::backend("delete")(e)),
        }
    }

    async fn get_due_schedules(&self, now: DateTime<Utc>) -> Result<Vec<Schedule>> {
        let _guard = self.lock.read().await;
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .filter(|s| s.is_due(now))
            .collect())
    }

    #[instrument(skip(self, record), fields(status = %record.status))]
    async fn record_execution(&self, id: &str, record: ExecutionRecord) -> Result<()> {
        self.modify(id, "record_execution", |s| {
            s.last_execution = Some(record);
            s.execution_count += 1;
        })
        .await
    }

    #[instrument(skip(self))]
    async fn update_next_execution(&self, id: &str, next: DateTime<Utc>) -> Result<()> {
        self.modify(id, "update_next_execution", |s| {
            s.next_execution_at = Some(next);
        })
        .await
    }

    #[instrument(skip(self, record))]
    async fn complete_with_execution(&self, id: &str, record: ExecutionRecord) -> Result<()> {
        self.modify(id, "complete_with_execution", |s| {
            s.last_execution = Some(record);
            s.execution_count += 1;
            s.status = ScheduleStatus::Completed;
            s.next_execution_at = None;
        })
        .await
    }
}
