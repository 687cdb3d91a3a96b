//! Typed error hierarchy for the MetriTask client core.
//!
//! Three top-level enums cover the three subsystems:
//! - `GatewayError`: classified failures of the remote REST backend
//! - `BoardError`: Kanban board moves and commits
//! - `SessionError`: credential storage

use serde::Serialize;
use thiserror::Error;

use crate::models::TaskStatus;

/// Failures surfaced by the remote data gateway.
///
/// Every HTTP status the backend can answer with maps onto exactly one
/// variant; see [`GatewayError::from_status`].
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: String, id: String },

    #[error("Conflict: {message}")]
    Conflict { message: String },

    #[error("Transport error: {message}")]
    Transport {
        status: Option<u16>,
        message: String,
    },
}

impl GatewayError {
    /// Classify a non-success HTTP status.
    ///
    /// `entity` and `id` only feed the `NotFound` message; `message` is the
    /// server-supplied text extracted from the response body.
    pub fn from_status(status: u16, entity: &str, id: &str, message: String) -> Self {
        match status {
            401 | 403 => Self::Auth(message),
            404 => Self::NotFound {
                entity: entity.to_string(),
                id: id.to_string(),
            },
            409 => Self::Conflict { message },
            422 => Self::Validation { message },
            _ => Self::Transport {
                status: Some(status),
                message,
            },
        }
    }

    pub fn missing_credential() -> Self {
        Self::Auth("no session token available".to_string())
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            status: None,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Auth(_) => ErrorKind::Auth,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Transport { .. } => ErrorKind::Transport,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport {
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for GatewayError {
    fn from(err: serde_json::Error) -> Self {
        Self::transport(format!("Failed to decode response: {}", err))
    }
}

/// Coarse classification of a [`GatewayError`], cheap to copy into
/// cache and board state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Auth,
    Validation,
    NotFound,
    Conflict,
    Transport,
}

/// Errors from the board state manager.
#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Failed to commit move of task {task_id}: {source}")]
    CommitFailed {
        task_id: i64,
        #[source]
        source: GatewayError,
    },

    #[error("Task {task_id} is not on the board")]
    UnknownTask { task_id: i64 },

    #[error("Task {task_id} was dropped into {expected}, refusing to commit it as {requested}")]
    StatusMismatch {
        task_id: i64,
        expected: TaskStatus,
        requested: TaskStatus,
    },
}

impl BoardError {
    /// The classified gateway failure behind this error, if any.
    pub fn gateway_error(&self) -> Option<&GatewayError> {
        match self {
            Self::CommitFailed { source, .. } => Some(source),
            Self::UnknownTask { .. } | Self::StatusMismatch { .. } => None,
        }
    }
}

/// Errors from reading or writing the persisted session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to access session file at {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Session file at {path} is malformed: {source}")]
    Malformed {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("No configuration directory available for the session file")]
    NoConfigDir,
}
