//! Task persistence.
//!
//! The store is the only thing that touches the task file. It is owned by the main
//! loop and is not shared.
//!
//! Format: TOML with one array of tables per persisted collection (`pending`,
//! `finished`, `deleted`, `errored`). The `instant` lane is never written; those
//! tasks are lost on restart. Every save is a full rewrite through a temporary
//! sibling file and an atomic rename.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::observability::QueueCounts;
use crate::queue::{PersistedTasks, TaskQueue};

mod record;

use record::StoreDocument;

#[derive(Debug)]
pub struct TaskStore {
    path: PathBuf,
    /// Collection sizes at the last successful load or save.
    last_saved: Option<[usize; 4]>,
}

impl TaskStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_saved: None,
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(config.path.clone())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the file into `queue`, or create an empty one if it does not exist.
    ///
    /// `now` is used as the creation time of records that carry no `date`.
    pub fn load(&mut self, queue: &mut TaskQueue, now: DateTime<Utc>) -> Result<QueueCounts, StoreError> {
        let tasks = match Self::read(&self.path, now)? {
            Some(tasks) => tasks,
            None => {
                info!(path = %self.path.display(), "task store not found, creating an empty one");
                let empty = PersistedTasks::default();
                self.save(&empty)?;
                empty
            }
        };

        self.last_saved = Some(tasks.sizes());
        queue.restore(tasks);

        let counts = queue.counts();
        info!(
            path = %self.path.display(),
            pending = counts.pending,
            finished = counts.finished,
            deleted = counts.deleted,
            errored = counts.errored,
            next_id = queue.last_id() + 1,
            "task store loaded"
        );
        Ok(counts)
    }

    /// Parse a task file without touching any queue. `Ok(None)` if the file is
    /// missing or empty.
    pub fn read(path: &Path, now: DateTime<Utc>) -> Result<Option<PersistedTasks>, StoreError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).map_err(|source| io_error(path, source))?;
        if content.trim().is_empty() {
            return Ok(None);
        }

        let document: StoreDocument = toml::from_str(&content).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Some(document.into_tasks(now)))
    }

    /// Whether any persisted collection changed size since the last save.
    pub fn needs_save(&self, counts: &QueueCounts) -> bool {
        self.last_saved != Some(counts.persisted())
    }

    /// Full rewrite. On failure the recorded sizes are left alone, so the next
    /// `needs_save` check still reports the change and the save is retried.
    pub fn save(&mut self, tasks: &PersistedTasks) -> Result<(), StoreError> {
        let document = StoreDocument::from_tasks(tasks);
        let rendered = toml::to_string_pretty(&document).map_err(|source| StoreError::Serialize {
            path: self.path.clone(),
            source,
        })?;

        self.write_atomically(rendered.as_bytes())?;
        self.last_saved = Some(tasks.sizes());
        debug!(path = %self.path.display(), tasks = tasks.len(), "task store saved");
        Ok(())
    }

    fn write_atomically(&self, bytes: &[u8]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|source| io_error(parent, source))?;
        }

        let tmp_path = self.temp_path()?;
        let mut tmp_file = File::create(&tmp_path).map_err(|source| io_error(&tmp_path, source))?;
        tmp_file
            .write_all(bytes)
            .and_then(|()| tmp_file.sync_all())
            .map_err(|source| io_error(&tmp_path, source))?;
        drop(tmp_file);

        fs::rename(&tmp_path, &self.path).map_err(|source| io_error(&self.path, source))
    }

    fn temp_path(&self) -> Result<PathBuf, StoreError> {
        let mut name = self
            .path
            .file_name()
            .ok_or_else(|| {
                io_error(
                    &self.path,
                    std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
                )
            })?
            .to_os_string();
        name.push(".tmp");
        Ok(self.path.with_file_name(name))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ActionKind, TaskDraft, TaskId, keys};

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn missing_file_creates_directory_and_empty_skeleton() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/data/tasks.toml");
        let mut store = TaskStore::new(&path);
        let mut queue = TaskQueue::new();

        let counts = store.load(&mut queue, now()).unwrap();

        assert_eq!(queue.pending_count(), 0);
        assert_eq!(counts, QueueCounts::default());
        assert!(path.exists());

        let written = fs::read_to_string(&path).unwrap();
        for group in ["pending", "finished", "deleted", "errored"] {
            assert!(written.contains(group), "skeleton is missing `{group}`: {written}");
        }
        assert!(!store.needs_save(&queue.counts()));
    }

    #[test]
    fn save_and_reload_round_trips_persisted_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.toml");

        let mut queue = TaskQueue::new();
        let vip = queue.submit(
            TaskDraft::new(ActionKind::VipGrant, false)
                .with_field(keys::USER_NAME, "alice")
                .with_field(keys::REWARD_COST, "5000"),
            now(),
        );
        let timeout = queue.submit(
            TaskDraft::new(ActionKind::Timeout, false)
                .with_field(keys::USER_NAME, "bob")
                .with_field(keys::USER_INPUT, "carol")
                .with_duration(120),
            now(),
        );
        queue.submit(
            TaskDraft::new(ActionKind::RoleGrant, false)
                .with_field(keys::USER_NAME, "dave")
                .with_role("Supporter"),
            now(),
        );
        // instant は保存されない
        queue.submit(
            TaskDraft::new(ActionKind::Timeout, true).with_field(keys::USER_NAME, "eve"),
            now(),
        );
        let finished = queue.dequeue().unwrap();
        queue.finish(finished);

        let mut store = TaskStore::new(&path);
        store.save(&queue.persisted()).unwrap();

        let mut reloaded = TaskQueue::new();
        let counts = TaskStore::new(&path).load(&mut reloaded, now()).unwrap();

        assert_eq!(counts.pending, 2);
        assert_eq!(counts.finished, 1);
        assert_eq!(counts.instant, 0);
        assert_eq!(reloaded.persisted(), queue.persisted());

        let (_, restored) = reloaded.get(timeout).unwrap();
        assert_eq!(restored.duration_secs(), Some(120));
        assert_eq!(restored.target(), Some("carol"));
        assert!(reloaded.get(vip).is_some());
    }

    #[test]
    fn ids_keep_increasing_across_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.toml");

        let mut queue = TaskQueue::new();
        let mut last = TaskId::new(0);
        for user in ["a", "b", "c"] {
            last = queue.submit(
                TaskDraft::new(ActionKind::VipGrant, false).with_field(keys::USER_NAME, user),
                now(),
            );
        }
        TaskStore::new(&path).save(&queue.persisted()).unwrap();

        let mut reloaded = TaskQueue::new();
        TaskStore::new(&path).load(&mut reloaded, now()).unwrap();
        let next = reloaded.submit(
            TaskDraft::new(ActionKind::VipGrant, false).with_field(keys::USER_NAME, "d"),
            now(),
        );

        assert!(next > last);
    }

    #[test]
    fn change_detection_tracks_persisted_sizes_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = TaskStore::new(dir.path().join("tasks.toml"));
        let mut queue = TaskQueue::new();
        store.load(&mut queue, now()).unwrap();

        queue.submit(
            TaskDraft::new(ActionKind::Timeout, true).with_field(keys::USER_NAME, "a"),
            now(),
        );
        assert!(!store.needs_save(&queue.counts()));

        queue.submit(
            TaskDraft::new(ActionKind::VipGrant, false).with_field(keys::USER_NAME, "b"),
            now(),
        );
        assert!(store.needs_save(&queue.counts()));

        store.save(&queue.persisted()).unwrap();
        assert!(!store.needs_save(&queue.counts()));
    }

    #[test]
    fn failed_save_is_retried_on_next_check() {
        let dir = tempfile::tempdir().unwrap();
        // 親がファイルなのでディレクトリを作れず保存に失敗する
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "x").unwrap();
        let mut store = TaskStore::new(blocker.join("tasks.toml"));

        let mut queue = TaskQueue::new();
        queue.submit(
            TaskDraft::new(ActionKind::VipGrant, false).with_field(keys::USER_NAME, "a"),
            now(),
        );

        assert!(matches!(store.save(&queue.persisted()), Err(StoreError::Io { .. })));
        assert!(store.needs_save(&queue.counts()));
    }

    #[test]
    fn corrupt_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.toml");
        fs::write(&path, "pending = [[[").unwrap();

        let err = TaskStore::new(&path).load(&mut TaskQueue::new(), now()).unwrap_err();
        assert!(matches!(err, StoreError::Parse { .. }));
    }
}
