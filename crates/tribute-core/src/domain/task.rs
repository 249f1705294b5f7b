use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{ActionKind, TaskAction, TaskId};
use crate::error::ValidationError;

/// String payload attached to a task. Ordered so persisted records are stable.
pub type Payload = BTreeMap<String, String>;

/// Well-known payload keys.
pub mod keys {
    pub const USER_NAME: &str = "user_name";
    pub const USER_INPUT: &str = "user_input";
    pub const REWARD_NAME: &str = "reward_name";
    pub const REWARD_COST: &str = "reward_cost";

    /// Keys owned by the task record itself; a payload may not shadow them.
    pub const RESERVED: [&str; 7] = ["id", "action", "instant", "date", "duration", "time", "role"];

    pub fn is_reserved(key: &str) -> bool {
        RESERVED.contains(&key)
    }
}

/// One unit of work.
///
/// Everything except the queue location is fixed at creation. The location lives in
/// the queue (which collection holds the task), not on the task itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Task {
    id: TaskId,
    action: TaskAction,
    payload: Payload,
    instant: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    created_at: DateTime<Utc>,
}

impl Task {
    pub fn new(id: TaskId, draft: TaskDraft, created_at: DateTime<Utc>) -> Self {
        let TaskDraft {
            action,
            payload,
            instant,
            duration_secs,
            role,
        } = draft;

        Self {
            id,
            action,
            payload,
            instant,
            duration_secs,
            role,
            created_at,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn action(&self) -> &TaskAction {
        &self.action
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn instant(&self) -> bool {
        self.instant
    }

    pub fn duration_secs(&self) -> Option<u64> {
        self.duration_secs
    }

    pub fn role(&self) -> Option<&str> {
        self.role.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn field(&self, key: &str) -> Option<&str> {
        self.payload
            .get(key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// The user the action applies to.
    ///
    /// Free-text input from the redemption wins over the redeemer's own name, since
    /// viewers use it to name someone else.
    pub fn target(&self) -> Option<&str> {
        self.field(keys::USER_INPUT)
            .or_else(|| self.field(keys::USER_NAME))
    }
}

/// Everything needed to create a task except its id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub action: TaskAction,
    pub payload: Payload,
    pub instant: bool,
    pub duration_secs: Option<u64>,
    pub role: Option<String>,
}

impl TaskDraft {
    pub fn new(action: impl Into<TaskAction>, instant: bool) -> Self {
        Self {
            action: action.into(),
            payload: Payload::new(),
            instant,
            duration_secs: None,
            role: None,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }

    pub fn with_duration(mut self, secs: u64) -> Self {
        self.duration_secs = Some(secs);
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Checks applied to operator-submitted tasks.
    ///
    /// Redemption-created tasks skip this: they inherit their fields from a reward
    /// table that was validated at config load.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let kind = match &self.action {
            TaskAction::Known(kind) => *kind,
            TaskAction::Unknown(raw) => return Err(ValidationError::UnknownAction(raw.clone())),
        };

        if let Some(key) = self.payload.keys().find(|key| keys::is_reserved(key)) {
            return Err(ValidationError::ReservedKey(key.clone()));
        }

        match kind {
            ActionKind::Timeout if !matches!(self.duration_secs, Some(secs) if secs > 0) => {
                return Err(ValidationError::MissingDuration(kind));
            }
            ActionKind::RoleGrant | ActionKind::RoleRevoke
                if self.role.as_deref().is_none_or(|role| role.trim().is_empty()) =>
            {
                return Err(ValidationError::MissingRole(kind));
            }
            _ => {}
        }

        if kind.requires_target() && !self.has_target() {
            return Err(ValidationError::MissingTarget(kind));
        }

        Ok(())
    }

    fn has_target(&self) -> bool {
        [keys::USER_INPUT, keys::USER_NAME].iter().any(|key| {
            self.payload
                .get(*key)
                .is_some_and(|value| !value.trim().is_empty())
        })
    }
}
