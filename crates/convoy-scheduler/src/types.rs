use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use convoy_sessions::SlackParams;
pub use convoy_sessions::Scope;

use crate::error::{Result, SchedulerError};

/// Lifecycle state of a schedule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleStatus {
    /// Eligible for execution whenever `next_execution_at` passes.
    #[default]
    Active,
    /// Kept but never executed until resumed.
    Paused,
    /// Terminal. Only one-time schedules reach it.
    Completed,
}

impl std::fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ScheduleStatus::Active => "active",
            ScheduleStatus::Paused => "paused",
            ScheduleStatus::Completed => "completed",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ScheduleStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(ScheduleStatus::Active),
            "paused" => Ok(ScheduleStatus::Paused),
            "completed" => Ok(ScheduleStatus::Completed),
            other => Err(format!("unknown schedule status: {other}")),
        }
    }
}

/// Outcome of one execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Failed,
    Skipped,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Skipped => "skipped",
        };
        write!(f, "{s}")
    }
}

/// The most recent execution of a schedule. Only one is retained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub executed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionRecord {
    pub fn success(executed_at: DateTime<Utc>, session_id: impl Into<String>) -> Self {
        Self {
            executed_at,
            session_id: Some(session_id.into()),
            status: ExecutionStatus::Success,
            error: None,
        }
    }

    pub fn failed(executed_at: DateTime<Utc>, error: impl Into<String>) -> Self {
        Self {
            executed_at,
            session_id: None,
            status: ExecutionStatus::Failed,
            error: Some(error.into()),
        }
    }

    /// `session_id` is the still-running session that caused the skip.
    pub fn skipped(
        executed_at: DateTime<Utc>,
        session_id: Option<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            executed_at,
            session_id,
            status: ExecutionStatus::Skipped,
            error: Some(reason.into()),
        }
    }
}

/// Per-session launch parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionParams {
    /// Initial message sent to the agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Creator's personal token. Never forwarded for team-scoped schedules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_type: Option<String>,
    /// Session terminates after answering the initial message.
    #[serde(default)]
    pub oneshot: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slack: Option<SlackParams>,
}

/// Payload used to build the session-creation request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<SessionParams>,
}

/// A persisted scheduling intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,
    pub name: String,
    pub user_id: String,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(default)]
    pub status: ScheduleStatus,
    /// One-time execution instant (or the anchor of a recurring schedule).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Five-field cron expression; empty for one-time schedules.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cron_expr: String,
    /// IANA zone used to evaluate `cron_expr`; empty means UTC.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub timezone: String,
    #[serde(default)]
    pub session_config: SessionConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_execution: Option<ExecutionRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_execution_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub execution_count: u64,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: DateTime<Utc>,
}

impl Schedule {
    /// An active, user-scoped schedule with no timing yet.
    pub fn new(id: impl Into<String>, name: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            user_id: user_id.into(),
            scope: Scope::User,
            team_id: None,
            status: ScheduleStatus::Active,
            scheduled_at: None,
            cron_expr: String::new(),
            timezone: String::new(),
            session_config: SessionConfig::default(),
            last_execution: None,
            next_execution_at: None,
            execution_count: 0,
            created_at: DateTime::<Utc>::default(),
            updated_at: DateTime::<Utc>::default(),
        }
    }

    pub fn with_cron(mut self, expr: impl Into<String>, timezone: impl Into<String>) -> Self {
        self.cron_expr = expr.into();
        self.timezone = timezone.into();
        self
    }

    pub fn with_scheduled_at(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_at = Some(at);
        self
    }

    pub fn with_team(mut self, team_id: impl Into<String>) -> Self {
        self.scope = Scope::Team;
        self.team_id = Some(team_id.into());
        self
    }

    /// Required-field check. Cron and timezone syntax are checked separately
    /// by [`crate::cron::validate_timing`].
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(SchedulerError::invalid("id", "id is required"));
        }
        if self.name.is_empty() {
            return Err(SchedulerError::invalid("name", "name is required"));
        }
        if self.user_id.is_empty() {
            return Err(SchedulerError::invalid("user_id", "user_id is required"));
        }
        if self.scheduled_at.is_none() && self.cron_expr.is_empty() {
            return Err(SchedulerError::invalid(
                "scheduled_at",
                "either scheduled_at or cron_expr must be set",
            ));
        }
        Ok(())
    }

    /// Team scope needs a team to belong to.
    pub fn validate_ownership(&self) -> Result<()> {
        if self.scope == Scope::Team && self.team_id.as_deref().unwrap_or("").is_empty() {
            return Err(SchedulerError::invalid("team_id", "team_id is required for team scope"));
        }
        Ok(())
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == ScheduleStatus::Active
            && self.next_execution_at.is_some_and(|next| now >= next)
    }

    /// Fires once at `scheduled_at` and then completes.
    pub fn is_one_time(&self) -> bool {
        self.scheduled_at.is_some() && self.cron_expr.is_empty()
    }

    pub fn is_recurring(&self) -> bool {
        !self.cron_expr.is_empty()
    }

    /// Session ID of the most recent execution, if it produced or observed one.
    pub fn last_session_id(&self) -> Option<&str> {
        self.last_execution
            .as_ref()
            .and_then(|e| e.session_id.as_deref())
            .filter(|id| !id.is_empty())
    }
}

/// In-memory predicates applied by `list`. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleFilter {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub status: Option<ScheduleStatus>,
    #[serde(default)]
    pub scope: Option<Scope>,
    #[serde(default)]
    pub team_id: Option<String>,
    /// Team-scoped schedules belonging to any of these teams. Non-empty
    /// `team_ids` excludes user-scoped schedules.
    #[serde(default)]
    pub team_ids: Vec<String>,
}

impl ScheduleFilter {
    pub fn matches(&self, schedule: &Schedule) -> bool {
        if self.user_id.as_ref().is_some_and(|u| *u != schedule.user_id) {
            return false;
        }
        if self.status.is_some_and(|s| s != schedule.status) {
            return false;
        }
        if self.scope.is_some_and(|s| s != schedule.scope) {
            return false;
        }
        if let Some(team) = &self.team_id {
            if schedule.team_id.as_ref() != Some(team) {
                return false;
            }
        }
        if !self.team_ids.is_empty() {
            let member = schedule.scope == Scope::Team
                && schedule
                    .team_id
                    .as_ref()
                    .is_some_and(|t| self.team_ids.contains(t));
            if !member {
                return false;
            }
        }
        true
    }
}
