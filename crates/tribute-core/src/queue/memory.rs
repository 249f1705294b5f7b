//! In-memory task collections.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::{Lane, PersistedTasks, TaskState};
use crate::domain::{IdAllocator, Task, TaskDraft, TaskId};
use crate::error::QueueError;
use crate::observability::{QueueCounts, QueueSnapshot};

/// The five task collections plus the id allocator.
#[derive(Debug, Default)]
pub struct TaskQueue {
    ids: IdAllocator,

    /// FIFO, drained by the main loop.
    pending: VecDeque<Task>,

    /// FIFO, drained by the instant loop. Not persisted.
    instant: VecDeque<Task>,

    finished: Vec<Task>,
    deleted: Vec<Task>,
    errored: Vec<Task>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_allocator(ids: IdAllocator) -> Self {
        Self {
            ids,
            ..Self::default()
        }
    }

    /// Build a task with a fresh id. The task is not enqueued.
    pub fn create(&mut self, draft: TaskDraft, created_at: DateTime<Utc>) -> Task {
        Task::new(self.ids.allocate(), draft, created_at)
    }

    /// Create and enqueue in one step.
    pub fn submit(&mut self, draft: TaskDraft, created_at: DateTime<Utc>) -> TaskId {
        let task = self.create(draft, created_at);
        let id = task.id();
        self.enqueue(task);
        id
    }

    /// Append to `instant` or `pending` depending on the task's flag.
    /// Duplicate payloads are allowed.
    pub fn enqueue(&mut self, task: Task) {
        let lane = Lane::for_task(&task);
        self.push(task, lane);
    }

    /// Append to an explicit lane, regardless of the task's own flag.
    /// Used for operator re-queues; the id is preserved.
    pub fn requeue(&mut self, task: Task, lane: Lane) {
        self.push(task, lane);
    }

    fn push(&mut self, task: Task, lane: Lane) {
        info!(
            task_id = %task.id(),
            action = %task.action(),
            lane = %lane,
            "adding task to queue"
        );
        match lane {
            Lane::Standard => self.pending.push_back(task),
            Lane::Instant => self.instant.push_back(task),
        }
    }

    /// Oldest pending task. Check `pending_count` first; this never blocks.
    pub fn dequeue(&mut self) -> Result<Task, QueueError> {
        let task = self.pending.pop_front().ok_or(QueueError::Empty {
            lane: Lane::Standard,
        })?;
        debug!(task_id = %task.id(), remaining = self.pending.len(), "dequeued task");
        Ok(task)
    }

    /// Oldest instant task.
    pub fn dequeue_instant(&mut self) -> Result<Task, QueueError> {
        let task = self.instant.pop_front().ok_or(QueueError::Empty {
            lane: Lane::Instant,
        })?;
        debug!(task_id = %task.id(), remaining = self.instant.len(), "dequeued instant task");
        Ok(task)
    }

    /// Remove a task by id, searching `pending`, `finished`, `deleted`, `errored` in
    /// that order. The `instant` lane is not searched: those tasks are about to run.
    pub fn find_by_id(&mut self, id: TaskId) -> Option<(TaskState, Task)> {
        if let Some(index) = self.pending.iter().position(|task| task.id() == id) {
            return self
                .pending
                .remove(index)
                .map(|task| (TaskState::Pending, task));
        }

        for (state, collection) in [
            (TaskState::Finished, &mut self.finished),
            (TaskState::Deleted, &mut self.deleted),
            (TaskState::Errored, &mut self.errored),
        ] {
            if let Some(index) = collection.iter().position(|task| task.id() == id) {
                return Some((state, collection.remove(index)));
            }
        }
        None
    }

    /// Look a task up without moving it. Searches all five collections.
    pub fn get(&self, id: TaskId) -> Option<(TaskState, &Task)> {
        let lanes = [
            (TaskState::Pending, &self.pending),
            (TaskState::Instant, &self.instant),
        ];
        for (state, lane) in lanes {
            if let Some(task) = lane.iter().find(|task| task.id() == id) {
                return Some((state, task));
            }
        }

        let terminal = [
            (TaskState::Finished, &self.finished),
            (TaskState::Deleted, &self.deleted),
            (TaskState::Errored, &self.errored),
        ];
        for (state, collection) in terminal {
            if let Some(task) = collection.iter().find(|task| task.id() == id) {
                return Some((state, task));
            }
        }
        None
    }

    pub fn finish(&mut self, task: Task) {
        info!(task_id = %task.id(), action = %task.action(), "task finished");
        self.finished.push(task);
    }

    pub fn delete(&mut self, task: Task) {
        info!(task_id = %task.id(), action = %task.action(), "task deleted");
        self.deleted.push(task);
    }

    pub fn mark_error(&mut self, task: Task) {
        info!(task_id = %task.id(), action = %task.action(), "task errored");
        self.errored.push(task);
    }

    /// Size of `pending` only.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn instant_count(&self) -> usize {
        self.instant.len()
    }

    pub fn counts(&self) -> QueueCounts {
        QueueCounts {
            pending: self.pending.len(),
            instant: self.instant.len(),
            finished: self.finished.len(),
            deleted: self.deleted.len(),
            errored: self.errored.len(),
        }
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            counts: self.counts(),
            pending: self.pending.iter().cloned().collect(),
            instant: self.instant.iter().cloned().collect(),
            finished: self.finished.clone(),
            deleted: self.deleted.clone(),
            errored: self.errored.clone(),
        }
    }

    /// Copy of the collections that get written to disk.
    pub fn persisted(&self) -> PersistedTasks {
        PersistedTasks {
            pending: self.pending.iter().cloned().collect(),
            finished: self.finished.clone(),
            deleted: self.deleted.clone(),
            errored: self.errored.clone(),
        }
    }

    /// Replace the persisted collections with tasks loaded from disk.
    ///
    /// The allocator is reseeded to the larger of the total task count and the
    /// highest restored id, so new ids never collide with restored ones. The
    /// `instant` lane is left untouched.
    pub fn restore(&mut self, tasks: PersistedTasks) {
        let floor = tasks.max_id().unwrap_or(0).max(tasks.len() as u64);
        self.ids.reseed(floor);

        let PersistedTasks {
            pending,
            finished,
            deleted,
            errored,
        } = tasks;
        self.pending = pending.into();
        self.finished = finished;
        self.deleted = deleted;
        self.errored = errored;
    }

    pub fn last_id(&self) -> u64 {
        self.ids.last()
    }
}
