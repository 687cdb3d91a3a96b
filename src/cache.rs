//! Last known server snapshot of one project aggregate.
//!
//! A refresh only replaces the snapshot (and notifies subscribers) when the
//! fetched aggregate differs structurally from the held one; timestamp bumps
//! and reordered collections do not count as changes. See
//! [`StructuralEq`](crate::equality::StructuralEq).

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::equality::StructuralEq;
use crate::errors::{ErrorKind, GatewayError};
use crate::gateway::Gateway;
use crate::models::{EntityKind, Project};

/// Classified failure of the last refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&GatewayError> for ErrorInfo {
    fn from(err: &GatewayError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum CacheEvent {
    /// A structurally different snapshot replaced the previous one.
    Updated { id: i64 },
    /// The snapshot was dropped, by a failed refresh (`error` set) or by
    /// [`EntityCache::invalidate`].
    Cleared { id: i64, error: Option<ErrorInfo> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Updated,
    /// Fetched aggregate was structurally equal to the held one.
    Unchanged,
    Failed(ErrorInfo),
    /// A newer refresh started while this one was in flight; its result was
    /// dropped.
    Superseded,
}

#[derive(Debug, Default)]
struct CacheState {
    id: Option<i64>,
    snapshot: Option<Project>,
    raw: Option<Value>,
    error: Option<ErrorInfo>,
    loading: bool,
    sequence: u64,
}

/// Cache of a single [`Project`] aggregate.
#[derive(Clone)]
pub struct EntityCache {
    gateway: Arc<dyn Gateway>,
    comparator: StructuralEq,
    state: Arc<Mutex<CacheState>>,
    events: broadcast::Sender<CacheEvent>,
}

impl EntityCache {
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self::with_comparator(gateway, StructuralEq::default())
    }

    pub fn with_comparator(gateway: Arc<dyn Gateway>, comparator: StructuralEq) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            gateway,
            comparator,
            state: Arc::new(Mutex::new(CacheState::default())),
            events,
        }
    }

    fn state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    pub fn current(&self) -> Option<Project> {
        self.state().snapshot.clone()
    }

    pub fn error(&self) -> Option<ErrorInfo> {
        self.state().error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state().loading
    }

    /// Fetch project `id` and reconcile it with the held snapshot.
    ///
    /// Failures are recorded, not returned: the snapshot is cleared, the
    /// error is available through [`EntityCache::error`] and nothing is
    /// retried.
    pub async fn refresh(&self, id: i64) -> RefreshOutcome {
        let loading = {
            let mut state = self.state();
            state.sequence += 1;
            state.loading = true;
            Loading {
                cache: self,
                sequence: state.sequence,
            }
        };
        let sequence = loading.sequence;

        let fetched = match self.gateway.get(EntityKind::Projects, id).await {
            Ok(raw) => decode_project(raw),
            Err(e) => Err(e),
        };
        drop(loading);

        let mut state = self.state();
        if state.sequence != sequence {
            return RefreshOutcome::Superseded;
        }

        match fetched {
            Ok((raw, project)) => {
                let same_aggregate = state.id == Some(id);
                let unchanged = same_aggregate
                    && state
                        .raw
                        .as_ref()
                        .is_some_and(|held| self.comparator.equal(held, &raw));
                state.error = None;
                if unchanged {
                    debug!(project_id = id, "refresh returned an unchanged aggregate");
                    return RefreshOutcome::Unchanged;
                }
                state.id = Some(id);
                state.snapshot = Some(project);
                state.raw = Some(raw);
                drop(state);
                let _ = self.events.send(CacheEvent::Updated { id });
                RefreshOutcome::Updated
            }
            Err(e) => {
                warn!(project_id = id, error = %e, "project refresh failed");
                let info = ErrorInfo::from(&e);
                state.id = Some(id);
                state.snapshot = None;
                state.raw = None;
                state.error = Some(info.clone());
                drop(state);
                let _ = self.events.send(CacheEvent::Cleared {
                    id,
                    error: Some(info.clone()),
                });
                RefreshOutcome::Failed(info)
            }
        }
    }

    /// Drop the held snapshot and error. In-flight refreshes are superseded.
    pub fn invalidate(&self) {
        let id = {
            let mut state = self.state();
            state.sequence += 1;
            state.loading = false;
            state.snapshot = None;
            state.raw = None;
            state.error = None;
            state.id.take()
        };
        if let Some(id) = id {
            let _ = self.events.send(CacheEvent::Cleared { id, error: None });
        }
    }
}

/// Clears `loading` when the refresh that set it ends, including when the
/// refresh future is dropped mid-request.
struct Loading<'a> {
    cache: &'a EntityCache,
    sequence: u64,
}

impl Drop for Loading<'_> {
    fn drop(&mut self) {
        let mut state = self.cache.state();
        if state.sequence == self.sequence {
            state.loading = false;
        }
    }
}

/// Decode the aggregate and keep its tasks ordered by id.
fn decode_project(raw: Value) -> Result<(Value, Project), GatewayError> {
    let mut project: Project = serde_json::from_value(raw.clone())?;
    project.tasks.sort_by_key(|t| t.id);
    Ok((raw, project))
}
