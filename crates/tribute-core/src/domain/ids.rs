//! Domain identifiers.
//!
//! Task ids are small integers so operators can type them into the dashboard.
//! They are allocated by [`IdAllocator`], which the queue reseeds from the store
//! on startup so ids stay unique across restarts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a task. Unique among all tasks the queue knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(u64);

impl TaskId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for TaskId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Monotonic id source.
///
/// `reseed` never moves the counter backwards, so ids handed out earlier in the
/// process lifetime are never reissued.
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    last: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self) -> TaskId {
        self.last += 1;
        TaskId(self.last)
    }

    /// Make sure the next allocation is strictly greater than `floor`.
    pub fn reseed(&mut self, floor: u64) {
        self.last = self.last.max(floor);
    }

    pub fn last(&self) -> u64 {
        self.last
    }
}
