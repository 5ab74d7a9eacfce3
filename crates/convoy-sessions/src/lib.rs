//! Interface to the external session runtime.
//!
//! The scheduler never manages agent processes itself; it asks a
//! [`SessionManager`] to create, inspect and delete sessions. The runtime
//! behind it (pods, local processes, a remote API) is out of this
//! workspace's hands. [`HttpSessionManager`] is the client used in
//! deployments where the runtime is reachable over HTTP.

pub mod error;
pub mod http;
pub mod manager;
pub mod types;

pub use error::{Result, SessionError};
pub use http::HttpSessionManager;
pub use manager::SessionManager;
pub use types::{CreateSessionRequest, RepositoryInfo, Scope, Session, SessionStatus, SlackParams};
