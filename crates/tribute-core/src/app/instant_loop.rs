//! InstantLoop - instant レーン専用の高速ループ
//!
//! One task per tick at a fixed cadence, independent of the main loop so a slow
//! drain never delays a low-latency action.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::{ReadyFlag, next_sleep, settle};
use crate::executor::ActionExecutor;
use crate::queue::{SharedQueue, TaskState};

pub struct InstantLoop {
    queue: SharedQueue,
    executor: Arc<ActionExecutor>,
    ready: ReadyFlag,
    interval: Duration,
}

impl InstantLoop {
    pub fn new(queue: SharedQueue, executor: Arc<ActionExecutor>, ready: ReadyFlag, interval: Duration) -> Self {
        Self {
            queue,
            executor,
            ready,
            interval,
        }
    }

    /// Run at most one instant task. `None` when not ready or the lane is empty.
    pub async fn tick(&self) -> Option<TaskState> {
        if !self.ready.is_ready() {
            return None;
        }

        let task = {
            let mut queue = self.queue.lock().await;
            if queue.instant_count() == 0 {
                return None;
            }
            match queue.dequeue_instant() {
                Ok(task) => task,
                Err(err) => {
                    warn!(error = %err, "instant lane emptied unexpectedly");
                    return None;
                }
            }
        };
        // ロックはここで解放済み。外部呼び出し中は保持しない

        Some(settle(&self.executor, &self.queue, task).await)
    }

    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        debug!(interval_ms = self.interval.as_millis() as u64, "instant loop started");
        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let started = Instant::now();
            self.tick().await;
            let pause = next_sleep(self.interval, started.elapsed());

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                changed = shutdown_rx.changed() => {
                    // sender が drop されたら止める
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        debug!("instant loop stopped");
    }
}
