use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use convoy_sessions::{CreateSessionRequest, RepositoryInfo, SessionManager};

use crate::cron::calculate_next_execution;
use crate::error::{Result, SchedulerError};
use crate::store::ScheduleStore;
use crate::types::{ExecutionRecord, ExecutionStatus, Schedule, Scope};

pub const TAG_SCHEDULE_ID: &str = "schedule_id";
pub const TAG_SCHEDULE_NAME: &str = "schedule_name";
pub const TAG_REPOSITORY: &str = "repository";
pub const TAG_BRANCH: &str = "branch";
pub const PREVIOUS_SESSION_ACTIVE: &str = "previous session still active";

/// Turns a schedule into a session and records what happened.
///
/// Used by the worker for due schedules and by the manual trigger path.
pub struct ScheduleExecutor {
    store: Arc<dyn ScheduleStore>,
    sessions: Arc<dyn SessionManager>,
}

impl ScheduleExecutor {
    pub fn new(store: Arc<dyn ScheduleStore>, sessions: Arc<dyn SessionManager>) -> Self {
        Self { store, sessions }
    }

    /// Execute one due schedule.
    ///
    /// * previous session still running: record `skipped` and advance
    /// * session creation fails: record `failed`, leave `next_execution_at`
    ///   alone so the next pass retries
    /// * recurring success: record and advance
    /// * one-time success: record and complete in one write
    pub async fn execute(
        &self,
        schedule: &Schedule,
        now: DateTime<Utc>,
    ) -> Result<ExecutionRecord> {
        if let Some(previous) = schedule.last_session_id() {
            match self.sessions.get_session(previous).await {
                Some(session) if session.status().is_running() => {
                    info!(
                        schedule_id = %schedule.id,
                        session_id = %previous,
                        status = %session.status(),
                        "previous session still running, skipping"
                    );
                    let record = ExecutionRecord::skipped(
                        now,
                        Some(previous.to_string()),
                        PREVIOUS_SESSION_ACTIVE,
                    );
                    self.store.record_execution(&schedule.id, record.clone()).await?;
                    self.advance(schedule, now).await?;
                    return Ok(record);
                }
                Some(_) => match self.sessions.delete_session(previous).await {
                    Ok(()) => debug!(
                        schedule_id = %schedule.id,
                        session_id = %previous,
                        "stale session deleted"
                    ),
                    Err(e) => warn!(
                        schedule_id = %schedule.id,
                        session_id = %previous,
                        error = %e,
                        "failed to delete stale session"
                    ),
                },
                None => {}
            }
        }

        let record = self.launch(schedule, now).await;
        match record.status {
            ExecutionStatus::Success if schedule.is_one_time() => {
                self.store.complete_with_execution(&schedule.id, record.clone()).await?;
                info!(schedule_id = %schedule.id, "one-time schedule completed");
            }
            ExecutionStatus::Success => {
                self.store.record_execution(&schedule.id, record.clone()).await?;
                self.advance(schedule, now).await?;
            }
            _ => {
                self.store.record_execution(&schedule.id, record.clone()).await?;
            }
        }
        Ok(record)
    }

    /// Run a schedule immediately, outside its cadence.
    ///
    /// Records the execution but neither advances `next_execution_at` nor
    /// completes one-time schedules. A failed creation is recorded and then
    /// returned as [`SchedulerError::SessionCreation`].
    pub async fn trigger(&self, id: &str) -> Result<ExecutionRecord> {
        let schedule = self.store.get(id).await?;
        let record = self.launch(&schedule, Utc::now()).await;
        self.store.record_execution(id, record.clone()).await?;
        info!(schedule_id = %id, status = %record.status, "schedule triggered manually");

        if record.status == ExecutionStatus::Failed {
            return Err(SchedulerError::SessionCreation(
                record.error.unwrap_or_default(),
            ));
        }
        Ok(record)
    }

    /// Create the session; never persists anything.
    async fn launch(&self, schedule: &Schedule, now: DateTime<Utc>) -> ExecutionRecord {
        let session_id = Uuid::new_v4().to_string();
        let request = build_session_request(schedule);

        match self.sessions.create_session(&session_id, &request).await {
            Ok(session) => {
                info!(
                    schedule_id = %schedule.id,
                    session_id = %session.id(),
                    "session created for schedule"
                );
                ExecutionRecord::success(now, session.id())
            }
            Err(e) => {
                error!(schedule_id = %schedule.id, error = %e, "session creation failed");
                ExecutionRecord::failed(now, e.to_string())
            }
        }
    }

    async fn advance(&self, schedule: &Schedule, now: DateTime<Utc>) -> Result<()> {
        match calculate_next_execution(schedule, now)? {
            Some(next) => {
                self.store.update_next_execution(&schedule.id, next).await?;
                debug!(schedule_id = %schedule.id, next = %next, "next execution scheduled");
            }
            None => warn!(schedule_id = %schedule.id, "schedule has no timing, not advanced"),
        }
        Ok(())
    }
}

/// Build the session-creation request for `schedule`.
///
/// Tags gain `schedule_id`/`schedule_name`; a `repository` tag (with an
/// optional `branch` tag) becomes the repository to check out. Team-scoped
/// schedules are restricted to their own team's credentials and never carry
/// the creator's personal GitHub token.
pub fn build_session_request(schedule: &Schedule) -> CreateSessionRequest {
    let config = &schedule.session_config;
    let params = config.params.clone().unwrap_or_default();

    let mut tags = config.tags.clone();
    tags.insert(TAG_SCHEDULE_ID.to_string(), schedule.id.clone());
    tags.insert(TAG_SCHEDULE_NAME.to_string(), schedule.name.clone());

    let repository = tags
        .get(TAG_REPOSITORY)
        .filter(|r| !r.is_empty())
        .map(|full_name| RepositoryInfo {
            full_name: full_name.clone(),
            branch: tags.get(TAG_BRANCH).filter(|b| !b.is_empty()).cloned(),
        });

    let (team_id, teams, github_token) = match (schedule.scope, &schedule.team_id) {
        (Scope::Team, Some(team)) => (Some(team.clone()), vec![team.clone()], None),
        (Scope::Team, None) => (None, Vec::new(), None),
        (Scope::User, _) => (None, Vec::new(), params.github_token),
    };

    CreateSessionRequest {
        user_id: schedule.user_id.clone(),
        scope: schedule.scope,
        team_id,
        teams,
        environment: config.environment.clone(),
        tags,
        github_token,
        repository,
        initial_message: params.message,
        agent_type: params.agent_type,
        oneshot: params.oneshot,
        slack: params.slack,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionParams;

    fn schedule_with_params() -> Schedule {
        let mut s = Schedule::new("sch-1", "nightly triage", "alice").with_cron("0 2 * * *", "");
        s.session_config.environment.insert("LOG_LEVEL".to_string(), "debug".to_string());
        s.session_config.tags.insert("repository".to_string(), "acme/api".to_string());
        s.session_config.tags.insert("branch".to_string(), "main".to_string());
        s.session_config.params = Some(SessionParams {
            message: Some("triage new issues".to_string()),
            github_token: Some("ghp_personal".to_string()),
            agent_type: Some("claude".to_string()),
            oneshot: true,
            slack: None,
        });
        s
    }

    #[test]
    fn user_scope_request_carries_token_and_tags() {
        let req = build_session_request(&schedule_with_params());
        assert_eq!(req.user_id, "alice");
        assert_eq!(req.scope, Scope::User);
        assert_eq!(req.github_token.as_deref(), Some("ghp_personal"));
        assert!(req.teams.is_empty());
        assert_eq!(req.tags["schedule_id"], "sch-1");
        assert_eq!(req.tags["schedule_name"], "nightly triage");
        assert_eq!(req.environment["LOG_LEVEL"], "debug");
        assert_eq!(
            req.repository,
            Some(RepositoryInfo {
                full_name: "acme/api".to_string(),
                branch: Some("main".to_string())
            })
        );
        assert_eq!(req.initial_message.as_deref(), Some("triage new issues"));
        assert!(req.oneshot);
    }

    #[test]
    fn team_scope_request_is_restricted_to_owning_team() {
        let schedule = schedule_with_params().with_team("acme/platform");
        let req = build_session_request(&schedule);
        assert_eq!(req.scope, Scope::Team);
        assert_eq!(req.team_id.as_deref(), Some("acme/platform"));
        assert_eq!(req.teams, vec!["acme/platform".to_string()]);
        assert!(req.github_token.is_none());
    }

    #[test]
    fn schedule_tags_override_user_supplied_ones() {
        let mut schedule = schedule_with_params();
        schedule
            .session_config
            .tags
            .insert("schedule_id".to_string(), "spoofed".to_string());
        let req = build_session_request(&schedule);
        assert_eq!(req.tags["schedule_id"], "sch-1");
    }

    #[test]
    fn missing_repository_tag_means_no_repository() {
        let mut schedule = schedule_with_params();
        schedule.session_config.tags.clear();
        assert!(build_session_request(&schedule).repository.is_none());
    }
}
