use thiserror::Error;

#[derive(Debug, Error)]
pub enum LeaderError {
    /// Underlying SQLite / rusqlite error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Durations that cannot produce a stable election.
    #[error("invalid elector config: {0}")]
    InvalidConfig(String),

    /// Any other lease backend failure.
    #[error("lease backend error: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, LeaderError>;
