//! Remote data gateway: the only component that talks to the backend.
//!
//! ## Overview
//!
//! [`Gateway`] is the async seam the cache and the board depend on; tests
//! substitute in-memory fakes. [`HttpGateway`] is the production
//! implementation over `reqwest`:
//!
//! ```text
//! ┌──────────────┐  Arc<dyn Gateway>  ┌──────────────┐  HTTPS + Bearer  ┌─────────┐
//! │ EntityCache  │ ─────────────────> │ HttpGateway  │ ───────────────> │ backend │
//! │ BoardManager │ <───────────────── │  (reqwest)   │ <─────────────── │  (REST) │
//! └──────────────┘  GatewayError      └──────────────┘  JSON / status   └─────────┘
//! ```
//!
//! Status classification lives in [`GatewayError::from_status`]. The
//! gateway never touches cached state; callers own reconciliation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::errors::GatewayError;
use crate::models::{
    AuthResponse, EntityKind, LoginRequest, NewProject, NewTask, Project, ProjectUpdate,
    RegisterRequest, Task, TaskStatus, User,
};
use crate::session::CredentialProvider;

/// Query pairs appended to a list request (`?project_id=3&status=pending`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListFilter {
    pairs: Vec<(String, String)>,
}

impl ListFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.pairs.push((key.into(), value.to_string()));
        self
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.pairs
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

#[async_trait]
pub trait Gateway: Send + Sync {
    async fn list(&self, kind: EntityKind, filter: &ListFilter) -> Result<Vec<Value>, GatewayError>;

    async fn get(&self, kind: EntityKind, id: i64) -> Result<Value, GatewayError>;

    async fn create(&self, kind: EntityKind, payload: Value) -> Result<Value, GatewayError>;

    /// Partial update: only the fields present in `payload` change.
    async fn update(&self, kind: EntityKind, id: i64, payload: Value)
    -> Result<Value, GatewayError>;

    async fn delete(&self, kind: EntityKind, id: i64) -> Result<(), GatewayError>;

    async fn add_member(&self, project_id: i64, user_id: i64) -> Result<(), GatewayError>;

    async fn remove_member(&self, project_id: i64, user_id: i64) -> Result<(), GatewayError>;
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, GatewayError> {
    serde_json::from_value(value).map_err(GatewayError::from)
}

/// Typed helpers over the untyped [`Gateway`] calls.
#[async_trait]
pub trait GatewayExt: Gateway {
    async fn list_projects(&self) -> Result<Vec<Project>, GatewayError> {
        let values = self.list(EntityKind::Projects, &ListFilter::new()).await?;
        decode(Value::Array(values))
    }

    async fn get_project(&self, id: i64) -> Result<Project, GatewayError> {
        decode(self.get(EntityKind::Projects, id).await?)
    }

    async fn create_project(&self, project: &NewProject) -> Result<Project, GatewayError> {
        let payload = serde_json::to_value(project)?;
        decode(self.create(EntityKind::Projects, payload).await?)
    }

    async fn update_project(&self, id: i64, update: &ProjectUpdate) -> Result<Project, GatewayError> {
        let payload = serde_json::to_value(update)?;
        decode(self.update(EntityKind::Projects, id, payload).await?)
    }

    async fn delete_project(&self, id: i64) -> Result<(), GatewayError> {
        self.delete(EntityKind::Projects, id).await
    }

    async fn list_tasks(&self, filter: &ListFilter) -> Result<Vec<Task>, GatewayError> {
        let values = self.list(EntityKind::Tasks, filter).await?;
        decode(Value::Array(values))
    }

    async fn create_task(&self, task: &NewTask) -> Result<Task, GatewayError> {
        let payload = serde_json::to_value(task)?;
        decode(self.create(EntityKind::Tasks, payload).await?)
    }

    /// The single call a board commit issues: only `status` is sent.
    async fn update_task_status(&self, id: i64, status: TaskStatus) -> Result<Value, GatewayError> {
        self.update(EntityKind::Tasks, id, json!({ "status": status }))
            .await
    }

    async fn delete_task(&self, id: i64) -> Result<(), GatewayError> {
        self.delete(EntityKind::Tasks, id).await
    }

    async fn list_users(&self) -> Result<Vec<User>, GatewayError> {
        let values = self.list(EntityKind::Users, &ListFilter::new()).await?;
        decode(Value::Array(values))
    }
}

impl<G: Gateway + ?Sized> GatewayExt for G {}

/// Unwrap `{"data": ...}` envelopes some endpoints answer with.
fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.len() == 1 && map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Best-effort extraction of a human-readable message from an error body.
fn error_message(body: &str) -> String {
    let trimmed = body.trim();
    let Ok(value) = serde_json::from_str::<Value>(trimmed) else {
        return trimmed.to_string();
    };
    for key in ["message", "error", "detail"] {
        if let Some(msg) = value.get(key).and_then(Value::as_str) {
            return msg.to_string();
        }
    }
    match value.get("errors") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
            .collect::<Vec<_>>()
            .join("; "),
        Some(Value::Object(fields)) => fields
            .iter()
            .map(|(field, v)| format!("{}: {}", field, flatten_messages(v)))
            .collect::<Vec<_>>()
            .join("; "),
        _ => trimmed.to_string(),
    }
}

fn flatten_messages(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(flatten_messages)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

/// REST gateway over `reqwest` with bearer authentication.
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    session: Arc<dyn CredentialProvider>,
}

impl HttpGateway {
    pub fn new(base_url: &str, session: Arc<dyn CredentialProvider>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        }
    }

    /// Like [`HttpGateway::new`] with an overall per-request timeout. `None`
    /// leaves requests unbounded.
    pub fn with_timeout(
        base_url: &str,
        session: Arc<dyn CredentialProvider>,
        timeout: Option<Duration>,
    ) -> Result<Self, GatewayError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            session,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &Arc<dyn CredentialProvider> {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn authorized(&self, method: Method, path: &str) -> Result<RequestBuilder, GatewayError> {
        let token = self
            .session
            .token()
            .ok_or_else(GatewayError::missing_credential)?;
        Ok(self.client.request(method, self.url(path)).bearer_auth(token))
    }

    /// Send and classify. `entity`/`id` only label a 404.
    async fn execute(
        &self,
        request: RequestBuilder,
        entity: &str,
        id: &str,
    ) -> Result<Value, GatewayError> {
        let response = request.send().await?;
        let status = response.status();
        debug!(status = status.as_u16(), entity, id, "backend responded");

        let body = response.text().await?;
        if !status.is_success() {
            let mut message = error_message(&body);
            if message.is_empty() {
                message = status.canonical_reason().unwrap_or("request failed").to_string();
            }
            return Err(GatewayError::from_status(
                status.as_u16(),
                entity,
                id,
                message,
            ));
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        let value: Value = serde_json::from_str(&body)?;
        Ok(unwrap_envelope(value))
    }

    pub async fn login(&self, credentials: &LoginRequest) -> Result<AuthResponse, GatewayError> {
        let request = self.client.post(self.url("login")).json(credentials);
        let auth: AuthResponse = decode(self.execute(request, "login", "").await?)?;
        self.persist(&auth)?;
        Ok(auth)
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, GatewayError> {
        let builder = self.client.post(self.url("register")).json(request);
        let auth: AuthResponse = decode(self.execute(builder, "register", "").await?)?;
        self.persist(&auth)?;
        Ok(auth)
    }

    /// Ends the session. The local credential is cleared even when the
    /// backend call fails.
    pub async fn logout(&self) -> Result<(), GatewayError> {
        if self.session.token().is_some() {
            let request = self.authorized(Method::POST, "logout")?;
            if let Err(e) = self.execute(request, "logout", "").await {
                warn!("Backend logout failed, clearing local session anyway: {}", e);
            }
        }
        self.session
            .clear()
            .map_err(|e| GatewayError::Auth(format!("failed to clear session: {}", e)))
    }

    fn persist(&self, auth: &AuthResponse) -> Result<(), GatewayError> {
        self.session
            .store(&auth.token)
            .map_err(|e| GatewayError::Auth(format!("failed to persist session: {}", e)))
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn list(&self, kind: EntityKind, filter: &ListFilter) -> Result<Vec<Value>, GatewayError> {
        let mut request = self.authorized(Method::GET, kind.as_str())?;
        if !filter.is_empty() {
            request = request.query(filter.pairs());
        }
        match self.execute(request, kind.as_str(), "").await? {
            Value::Array(items) => Ok(items),
            Value::Null => Ok(Vec::new()),
            other => Err(GatewayError::transport(format!(
                "Expected a list of {}, got {}",
                kind, other
            ))),
        }
    }

    async fn get(&self, kind: EntityKind, id: i64) -> Result<Value, GatewayError> {
        let request = self.authorized(Method::GET, &format!("{}/{}", kind, id))?;
        self.execute(request, kind.as_str(), &id.to_string()).await
    }

    async fn create(&self, kind: EntityKind, payload: Value) -> Result<Value, GatewayError> {
        let request = self.authorized(Method::POST, kind.as_str())?.json(&payload);
        self.execute(request, kind.as_str(), "").await
    }

    async fn update(
        &self,
        kind: EntityKind,
        id: i64,
        payload: Value,
    ) -> Result<Value, GatewayError> {
        let request = self
            .authorized(Method::PATCH, &format!("{}/{}", kind, id))?
            .json(&payload);
        self.execute(request, kind.as_str(), &id.to_string()).await
    }

    async fn delete(&self, kind: EntityKind, id: i64) -> Result<(), GatewayError> {
        let request = self.authorized(Method::DELETE, &format!("{}/{}", kind, id))?;
        self.execute(request, kind.as_str(), &id.to_string())
            .await
            .map(|_| ())
    }

    async fn add_member(&self, project_id: i64, user_id: i64) -> Result<(), GatewayError> {
        let request = self
            .authorized(Method::POST, &format!("projects/{}/members", project_id))?
            .json(&json!({ "user_id": user_id }));
        self.execute(request, "projects", &project_id.to_string())
            .await
            .map(|_| ())
    }

    async fn remove_member(&self, project_id: i64, user_id: i64) -> Result<(), GatewayError> {
        let request = self.authorized(
            Method::DELETE,
            &format!("projects/{}/members/{}", project_id, user_id),
        )?;
        self.execute(request, "projects", &project_id.to_string())
            .await
            .map(|_| ())
    }
}
