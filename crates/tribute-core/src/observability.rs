use serde::{Deserialize, Serialize};

use crate::domain::Task;

/// Size of each task collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCounts {
    pub pending: usize,
    pub instant: usize,
    pub finished: usize,
    pub deleted: usize,
    pub errored: usize,
}

impl QueueCounts {
    /// Sizes of the collections that reach disk (`instant` is excluded).
    pub fn persisted(&self) -> [usize; 4] {
        [self.pending, self.finished, self.deleted, self.errored]
    }

    pub fn total(&self) -> usize {
        self.pending + self.instant + self.finished + self.deleted + self.errored
    }
}

/// Read-only copy of every collection, in queue order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueSnapshot {
    pub counts: QueueCounts,
    pub pending: Vec<Task>,
    pub instant: Vec<Task>,
    pub finished: Vec<Task>,
    pub deleted: Vec<Task>,
    pub errored: Vec<Task>,
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use crate::domain::{ActionKind, TaskAction, TaskDraft, keys};
    use crate::queue::TaskQueue;

    #[test]
    fn snapshot_serializes_actions_as_strings() {
        let mut queue = TaskQueue::new();
        let now = DateTime::<Utc>::UNIX_EPOCH;
        queue.submit(
            TaskDraft::new(ActionKind::VipGrant, false).with_field(keys::USER_NAME, "alice"),
            now,
        );
        queue.submit(TaskDraft::new(TaskAction::parse("bogus"), true), now);

        let json = serde_json::to_value(queue.snapshot()).unwrap();

        assert_eq!(json["counts"]["pending"], 1);
        assert_eq!(json["pending"][0]["action"], "vip_grant");
        assert_eq!(json["pending"][0]["payload"]["user_name"], "alice");
        assert_eq!(json["instant"][0]["action"], "bogus");
        assert!(json["pending"][0].get("role").is_none());
    }
}
