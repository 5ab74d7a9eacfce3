use thiserror::Error;

/// Errors surfaced by record backends.
#[derive(Debug, Error)]
pub enum RecordError {
    /// `create` targeted a name that is already taken.
    #[error("record already exists: {name}")]
    AlreadyExists { name: String },

    /// `update` or `delete` targeted a missing record.
    #[error("record not found: {name}")]
    NotFound { name: String },

    /// Underlying SQLite / rusqlite error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Stored labels could not be decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any other backend failure (lock poisoning, transport, …).
    #[error("backend error: {0}")]
    Backend(String),
}

impl RecordError {
    pub fn is_already_exists(&self) -> bool {
        matches!(self, RecordError::AlreadyExists { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RecordError::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, RecordError>;
