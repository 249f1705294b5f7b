//! Task queue: the five task collections and their mutation API.
//!
//! Design:
//! - `TaskQueue` is plain data with synchronous methods. Sharing goes through
//!   [`SharedQueue`] (a tokio `Mutex`), and callers hold the lock only for collection
//!   operations, never across an external call.
//! - A task is in exactly one collection at a time. Moving it is always
//!   "remove from one, then hand to another"; the terminal methods trust that the
//!   caller already removed the task.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::domain::Task;

pub mod memory;
pub mod state;

pub use memory::TaskQueue;
pub use state::TaskState;

/// The queue shared between the main loop and the instant loop.
pub type SharedQueue = Arc<Mutex<TaskQueue>>;

pub fn shared(queue: TaskQueue) -> SharedQueue {
    Arc::new(Mutex::new(queue))
}

/// The two runnable collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    /// `pending`, drained by the main loop.
    Standard,
    /// `instant`, drained one task at a time by the instant loop.
    Instant,
}

impl Lane {
    pub fn for_task(task: &Task) -> Self {
        if task.instant() {
            Lane::Instant
        } else {
            Lane::Standard
        }
    }

    pub fn state(self) -> TaskState {
        match self {
            Lane::Standard => TaskState::Pending,
            Lane::Instant => TaskState::Instant,
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.state().as_str())
    }
}

/// The four collections that survive a restart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PersistedTasks {
    pub pending: Vec<Task>,
    pub finished: Vec<Task>,
    pub deleted: Vec<Task>,
    pub errored: Vec<Task>,
}

impl PersistedTasks {
    pub fn len(&self) -> usize {
        self.pending.len() + self.finished.len() + self.deleted.len() + self.errored.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_id(&self) -> Option<u64> {
        self.iter().map(|task| task.id().get()).max()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.pending
            .iter()
            .chain(&self.finished)
            .chain(&self.deleted)
            .chain(&self.errored)
    }

    pub fn sizes(&self) -> [usize; 4] {
        [
            self.pending.len(),
            self.finished.len(),
            self.deleted.len(),
            self.errored.len(),
        ]
    }
}
