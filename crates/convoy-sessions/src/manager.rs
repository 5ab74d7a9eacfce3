use async_trait::async_trait;

use crate::error::Result;
use crate::types::{CreateSessionRequest, Session};

/// The session runtime as seen by the scheduler.
///
/// Implementations own timeouts: callers issue blocking calls and never
/// cancel an in-flight `create_session`.
#[async_trait]
pub trait SessionManager: Send + Sync {
    /// Launch a session under the caller-chosen `id`.
    async fn create_session(&self, id: &str, request: &CreateSessionRequest) -> Result<Session>;

    /// Current snapshot of a session, `None` if the runtime no longer knows it.
    async fn get_session(&self, id: &str) -> Option<Session>;

    /// Tear a session down.
    async fn delete_session(&self, id: &str) -> Result<()>;
}
