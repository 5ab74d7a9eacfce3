use thiserror::Error;

/// Errors returned by a [`SessionManager`](crate::SessionManager).
#[derive(Debug, Error)]
pub enum SessionError {
    /// The runtime has no session with this ID.
    #[error("session not found: {id}")]
    NotFound { id: String },

    /// The runtime refused or failed to create the session.
    #[error("session creation failed: {0}")]
    Creation(String),

    /// Transport-level failure talking to the runtime.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The runtime answered with an unexpected status code.
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
}

pub type Result<T> = std::result::Result<T, SessionError>;
