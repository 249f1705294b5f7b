//! App - アプリケーション層
//!
//! ports・queue・store を組み合わせて2つのループを動かします。
//!
//! # 主要コンポーネント
//! - **Orchestrator**: メインループ（期限切れ→キュー消化→認証更新→配信状態→保存）
//! - **InstantLoop**: instant レーンを1件ずつ処理する高速ループ
//! - **Dashboard**: 運用者コマンドをメインループへ送るハンドル
//! - **LivenessMonitor**: 配信の開始/終了を通知

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::domain::Task;
use crate::executor::ActionExecutor;
use crate::queue::{SharedQueue, TaskState};

pub mod dashboard;
pub mod instant_loop;
pub mod liveness;
pub mod orchestrator;

pub use self::dashboard::{Dashboard, TaskView, Transition};
pub use self::instant_loop::InstantLoop;
pub use self::liveness::{LiveTransition, LivenessMonitor};
pub use self::orchestrator::{Collaborators, Orchestrator, OrchestratorHandle, TickSummary};

/// Set once, when both platforms have finished starting up. Shared by both loops.
#[derive(Debug, Clone, Default)]
pub struct ReadyFlag(Arc<AtomicBool>);

impl ReadyFlag {
    pub fn is_ready(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Returns true only for the call that flipped the flag.
    pub fn mark_ready(&self) -> bool {
        !self.0.swap(true, Ordering::AcqRel)
    }
}

/// Time left in the tick. A tick that overran its interval gets no sleep.
pub fn next_sleep(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

/// Execute a task that has already been removed from its lane, then file it under
/// `finished` or `errored`. The queue lock is only taken after execution.
pub(crate) async fn settle(executor: &ActionExecutor, queue: &SharedQueue, task: Task) -> TaskState {
    let outcome = executor.execute(&task).await;

    let mut queue = queue.lock().await;
    match outcome {
        Ok(()) => {
            queue.finish(task);
            TaskState::Finished
        }
        Err(_) => {
            // 自動リトライはしない。運用者が再キューする
            queue.mark_error(task);
            TaskState::Errored
        }
    }
}
