//! Dashboard command channel.
//!
//! Operator actions never touch the queue directly. A [`Dashboard`] handle sends a
//! command to the main loop, which applies it between ticks and answers on a
//! oneshot channel. A web layer can clone the handle into every request handler.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use crate::domain::{RewardRedemption, Task, TaskDraft, TaskId};
use crate::error::DashboardError;
use crate::observability::QueueSnapshot;
use crate::queue::{Lane, TaskQueue, TaskState};

/// Manual move of an existing task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transition {
    Delete,
    /// Move to the instant lane so it runs within a second.
    RestartInstant,
    ForceFinish,
    /// Move back to `pending`.
    Requeue,
}

impl Transition {
    pub fn as_str(self) -> &'static str {
        match self {
            Transition::Delete => "delete",
            Transition::RestartInstant => "restart_instant",
            Transition::ForceFinish => "force_finish",
            Transition::Requeue => "requeue",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Transition {
    type Err = String;

    /// Accepts the canonical names and the short dashboard route names
    /// (`delete`, `start`, `end`, `queue`).
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "delete" => Ok(Transition::Delete),
            "start" | "restart_instant" => Ok(Transition::RestartInstant),
            "end" | "finish" | "force_finish" => Ok(Transition::ForceFinish),
            "queue" | "requeue" => Ok(Transition::Requeue),
            other => Err(format!("unknown transition `{other}`")),
        }
    }
}

/// A task and where it currently sits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskView {
    pub state: TaskState,
    pub task: Task,
}

type Reply<T> = oneshot::Sender<T>;

pub(crate) enum DashboardCommand {
    Submit {
        draft: TaskDraft,
        reply: Reply<Result<TaskId, DashboardError>>,
    },
    Redeem {
        redemption: RewardRedemption,
        reply: Reply<Vec<TaskId>>,
    },
    Get {
        id: TaskId,
        reply: Reply<Option<TaskView>>,
    },
    Transition {
        id: TaskId,
        transition: Transition,
        reply: Reply<Result<TaskState, DashboardError>>,
    },
    Snapshot {
        reply: Reply<QueueSnapshot>,
    },
}

/// Cloneable handle for operator actions.
#[derive(Debug, Clone)]
pub struct Dashboard {
    commands: mpsc::Sender<DashboardCommand>,
}

impl fmt::Debug for DashboardCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DashboardCommand::Submit { draft, .. } => f.debug_struct("Submit").field("draft", draft).finish(),
            DashboardCommand::Redeem { redemption, .. } => {
                f.debug_struct("Redeem").field("redemption", redemption).finish()
            }
            DashboardCommand::Get { id, .. } => f.debug_struct("Get").field("id", id).finish(),
            DashboardCommand::Transition { id, transition, .. } => f
                .debug_struct("Transition")
                .field("id", id)
                .field("transition", transition)
                .finish(),
            DashboardCommand::Snapshot { .. } => f.write_str("Snapshot"),
        }
    }
}

impl Dashboard {
    pub(crate) fn new(commands: mpsc::Sender<DashboardCommand>) -> Self {
        Self { commands }
    }

    /// Validate and enqueue an operator-submitted task.
    pub async fn submit(&self, draft: TaskDraft) -> Result<TaskId, DashboardError> {
        self.request(|reply| DashboardCommand::Submit { draft, reply })
            .await?
    }

    /// Feed a reward redemption. Returns the ids of the tasks it created (possibly none).
    pub async fn redeem(&self, redemption: RewardRedemption) -> Result<Vec<TaskId>, DashboardError> {
        self.request(|reply| DashboardCommand::Redeem { redemption, reply })
            .await
    }

    pub async fn get(&self, id: TaskId) -> Result<Option<TaskView>, DashboardError> {
        self.request(|reply| DashboardCommand::Get { id, reply }).await
    }

    pub async fn transition(&self, id: TaskId, transition: Transition) -> Result<TaskState, DashboardError> {
        self.request(|reply| DashboardCommand::Transition {
            id,
            transition,
            reply,
        })
        .await?
    }

    pub async fn snapshot(&self) -> Result<QueueSnapshot, DashboardError> {
        self.request(|reply| DashboardCommand::Snapshot { reply }).await
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> DashboardCommand,
    ) -> Result<T, DashboardError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| DashboardError::Closed)?;
        response.await.map_err(|_| DashboardError::Closed)
    }
}

/// Validate `draft` and enqueue it.
pub fn submit(queue: &mut TaskQueue, draft: TaskDraft, now: DateTime<Utc>) -> Result<TaskId, DashboardError> {
    draft.validate()?;
    Ok(queue.submit(draft, now))
}

/// Look a task up without moving it.
pub fn view(queue: &TaskQueue, id: TaskId) -> Option<TaskView> {
    queue.get(id).map(|(state, task)| TaskView {
        state,
        task: task.clone(),
    })
}

/// Apply a manual transition. The task keeps its id.
///
/// Tasks in the instant lane cannot be moved; they are about to run.
pub fn apply_transition(
    queue: &mut TaskQueue,
    id: TaskId,
    transition: Transition,
) -> Result<TaskState, DashboardError> {
    let (from, task) = queue.find_by_id(id).ok_or(DashboardError::NotFound(id))?;
    tracing::info!(task_id = %id, from = %from, transition = %transition, "manual task transition");

    let to = match transition {
        Transition::Delete => {
            queue.delete(task);
            TaskState::Deleted
        }
        Transition::RestartInstant => {
            queue.requeue(task, Lane::Instant);
            TaskState::Instant
        }
        Transition::ForceFinish => {
            queue.finish(task);
            TaskState::Finished
        }
        Transition::Requeue => {
            queue.requeue(task, Lane::Standard);
            TaskState::Pending
        }
    };
    Ok(to)
}
