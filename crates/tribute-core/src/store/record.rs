//! On-disk task record.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::domain::{Task, TaskAction, TaskDraft, TaskId, keys};
use crate::queue::PersistedTasks;

/// Top-level document: one array of tables per persisted collection.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct StoreDocument {
    #[serde(default)]
    pub pending: Vec<StoredTask>,
    #[serde(default)]
    pub finished: Vec<StoredTask>,
    #[serde(default)]
    pub deleted: Vec<StoredTask>,
    #[serde(default)]
    pub errored: Vec<StoredTask>,
}

/// Flat task record. Fixed fields first, then every payload pair as a plain string key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct StoredTask {
    pub id: u64,
    pub action: String,
    #[serde(serialize_with = "bool_as_string", deserialize_with = "lenient_bool")]
    pub instant: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<i64>,
    #[serde(default, alias = "time", skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(flatten)]
    pub payload: BTreeMap<String, String>,
}

impl StoredTask {
    pub fn from_task(task: &Task) -> Self {
        let payload = task
            .payload()
            .iter()
            .filter(|(key, _)| !keys::is_reserved(key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Self {
            id: task.id().get(),
            action: task.action().as_str().to_string(),
            instant: task.instant(),
            date: Some(task.created_at().timestamp()),
            duration: task.duration_secs(),
            role: task.role().map(str::to_string),
            payload,
        }
    }

    /// Rebuild the task. A record without a usable `date` gets `fallback` as its
    /// creation time.
    pub fn into_task(self, fallback: DateTime<Utc>) -> Task {
        let created_at = self
            .date
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or(fallback);

        let draft = TaskDraft {
            action: TaskAction::parse(&self.action),
            payload: self.payload,
            instant: self.instant,
            duration_secs: self.duration,
            role: self.role,
        };
        Task::new(TaskId::new(self.id), draft, created_at)
    }
}

impl StoreDocument {
    pub fn from_tasks(tasks: &PersistedTasks) -> Self {
        fn convert(collection: &[Task]) -> Vec<StoredTask> {
            collection.iter().map(StoredTask::from_task).collect()
        }
        Self {
            pending: convert(&tasks.pending),
            finished: convert(&tasks.finished),
            deleted: convert(&tasks.deleted),
            errored: convert(&tasks.errored),
        }
    }

    pub fn into_tasks(self, fallback: DateTime<Utc>) -> PersistedTasks {
        let convert = |collection: Vec<StoredTask>| -> Vec<Task> {
            collection
                .into_iter()
                .map(|record| record.into_task(fallback))
                .collect()
        };
        PersistedTasks {
            pending: convert(self.pending),
            finished: convert(self.finished),
            deleted: convert(self.deleted),
            errored: convert(self.errored),
        }
    }
}

/// The flag is written as the string `"true"`/`"false"` like every other attribute.
fn bool_as_string<S: Serializer>(flag: &bool, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(if *flag { "true" } else { "false" })
}

/// Accepts `true`, or the strings `"true"`/`"True"` older files carry.
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Text(String),
    }

    match Flag::deserialize(deserializer)? {
        Flag::Bool(flag) => Ok(flag),
        Flag::Text(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" | "" => Ok(false),
            other => Err(serde::de::Error::custom(format!(
                "invalid instant flag `{other}`"
            ))),
        },
    }
}
