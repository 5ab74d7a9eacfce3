use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Result, SessionError};
use crate::manager::SessionManager;
use crate::types::{CreateSessionRequest, Session};

/// Wire body for `POST /sessions`.
#[derive(Serialize)]
struct CreateBody<'a> {
    id: &'a str,
    #[serde(flatten)]
    request: &'a CreateSessionRequest,
}

/// [`SessionManager`] backed by a remote session API.
///
/// Endpoints: `POST /sessions`, `GET /sessions/{id}`, `DELETE /sessions/{id}`.
pub struct HttpSessionManager {
    client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpSessionManager {
    pub fn new(base_url: &str, api_token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        })
    }

    fn sessions_url(&self) -> String {
        format!("{}/sessions", self.base_url)
    }

    fn session_url(&self, id: &str) -> String {
        format!("{}/sessions/{}", self.base_url, id)
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn status_error(resp: reqwest::Response) -> SessionError {
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        SessionError::Status { status, body }
    }
}

#[async_trait]
impl SessionManager for HttpSessionManager {
    async fn create_session(&self, id: &str, request: &CreateSessionRequest) -> Result<Session> {
        let body = CreateBody { id, request };
        let resp = self
            .authorize(self.client.post(self.sessions_url()))
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(Self::status_error(resp).await);
        }
        let session: Session = resp.json().await?;
        debug!(session_id = %session.id, status = %session.status, "session created");
        Ok(session)
    }

    async fn get_session(&self, id: &str) -> Option<Session> {
        let resp = match self.authorize(self.client.get(self.session_url(id))).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(session_id = %id, error = %e, "session lookup failed");
                return None;
            }
        };
        if resp.status() == StatusCode::NOT_FOUND {
            return None;
        }
        if !resp.status().is_success() {
            let err = Self::status_error(resp).await;
            warn!(session_id = %id, error = %err, "session lookup failed");
            return None;
        }
        match resp.json::<Session>().await {
            Ok(session) => Some(session),
            Err(e) => {
                warn!(session_id = %id, error = %e, "bad session payload");
                None
            }
        }
    }

    async fn delete_session(&self, id: &str) -> Result<()> {
        let resp = self
            .authorize(self.client.delete(self.session_url(id)))
            .send()
            .await?;
        match resp.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(SessionError::NotFound { id: id.to_string() }),
            _ => Err(Self::status_error(resp).await),
        }
    }
}
