use convoy_records::RecordError;
use thiserror::Error;

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// No schedule with the given ID exists in the store.
    #[error("schedule not found: {id}")]
    ScheduleNotFound { id: String },

    /// The schedule failed validation and was not persisted.
    #[error("invalid schedule: {field}: {message}")]
    InvalidSchedule { field: String, message: String },

    /// `create` was called with an ID that is already stored.
    #[error("schedule already exists: {id}")]
    AlreadyExists { id: String },

    /// A cron expression could not be parsed.
    #[error("invalid cron expression `{expr}`: {message}")]
    InvalidCron { expr: String, message: String },

    /// A timezone name is not a known IANA zone.
    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),

    /// The record backend failed during `op`.
    #[error("record backend error during {op}: {source}")]
    Backend {
        op: &'static str,
        #[source]
        source: RecordError,
    },

    /// A stored record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The session runtime refused to create a session.
    #[error("session creation failed: {0}")]
    SessionCreation(String),
}

impl SchedulerError {
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        SchedulerError::InvalidSchedule {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn backend(op: &'static str) -> impl FnOnce(RecordError) -> Self {
        move |source| SchedulerError::Backend { op, source }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, SchedulerError::ScheduleNotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
