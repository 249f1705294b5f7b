use std::path::PathBuf;

use thiserror::Error;

use crate::domain::{ActionKind, TaskId};
use crate::queue::Lane;

/// Queue contract violations.
///
/// Callers are expected to check the lane's count before dequeuing; this error only
/// surfaces when that contract is broken.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("cannot dequeue from empty {lane} lane")]
    Empty { lane: Lane },
}

/// Persistence failures. The in-memory queue stays authoritative when these occur.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("task store I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("task store at {path} is not valid TOML: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("task store at {path} could not be serialized: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: toml::ser::Error,
    },
}

/// Failure reported by an external collaborator (chat platform, community server, notifier).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlatformError {
    #[error("{operation} failed: {message}")]
    Request { operation: String, message: String },

    #[error("{operation} timed out")]
    Timeout { operation: String },

    #[error("{operation} called before the platform session was loaded")]
    NotReady { operation: String },
}

impl PlatformError {
    pub fn request(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Request {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Why a task could not be executed. Every variant sends the task to `errored`.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("unknown task action: {0}")]
    UnknownAction(String),

    #[error("unknown reward redemption: {0}")]
    UnknownReward(String),

    #[error("{action} task is missing required field `{field}`")]
    MissingField {
        action: ActionKind,
        field: &'static str,
    },

    #[error("action not implemented: {0}")]
    NotImplemented(ActionKind),

    #[error("grant log {path} could not be written: {source}")]
    GrantLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Rejections for operator-submitted tasks.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unknown task action: {0}")]
    UnknownAction(String),

    #[error("{0} tasks require a positive duration")]
    MissingDuration(ActionKind),

    #[error("{0} tasks require a role name")]
    MissingRole(ActionKind),

    #[error("{0} tasks require a non-empty user_name or user_input")]
    MissingTarget(ActionKind),

    #[error("payload key `{0}` is reserved")]
    ReservedKey(String),
}

/// Results of dashboard commands sent to the orchestrator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DashboardError {
    #[error("orchestrator is not accepting commands")]
    Closed,

    #[error("task {0} not found")]
    NotFound(TaskId),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file {path} could not be read: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config is not valid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
