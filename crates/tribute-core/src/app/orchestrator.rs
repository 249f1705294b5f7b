//! Orchestrator - メインループ
//!
//! Per tick, in order: expiry check, drain of `pending`, credential refresh,
//! liveness poll, save-if-changed. Everything but the save is skipped until both
//! platforms report loaded. Between ticks the loop serves dashboard commands, so
//! every queue mutation outside the instant lane happens on this task.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::dashboard::{self, Dashboard, DashboardCommand};
use super::{InstantLoop, LivenessMonitor, ReadyFlag, next_sleep, settle};
use crate::config::{AppConfig, OrchestratorConfig};
use crate::credentials::CredentialRefresher;
use crate::domain::{RewardRedemption, RewardTable, TaskId};
use crate::error::StoreError;
use crate::executor::ActionExecutor;
use crate::grants::{ExpiryTracker, GrantLogs};
use crate::observability::QueueCounts;
use crate::ports::{ChatPlatform, Clock, CommunityPlatform, Notifier};
use crate::queue::{self, SharedQueue, TaskQueue};
use crate::store::TaskStore;

const COMMAND_BUFFER: usize = 64;

/// External collaborators the orchestrator drives.
#[derive(Clone)]
pub struct Collaborators {
    pub chat: Arc<dyn ChatPlatform>,
    pub community: Arc<dyn CommunityPlatform>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
}

/// What one main-loop tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub ready: bool,
    pub executed: usize,
    pub revoked: usize,
    pub refreshed: bool,
    pub saved: bool,
}

pub struct Orchestrator {
    config: OrchestratorConfig,
    queue: SharedQueue,
    store: TaskStore,
    executor: Arc<ActionExecutor>,
    expiry: ExpiryTracker,
    refresher: CredentialRefresher,
    liveness: LivenessMonitor,
    rewards: Arc<RewardTable>,
    collaborators: Collaborators,
    ready: ReadyFlag,
    /// Set while the empty-queue message has already been logged.
    observed_empty: bool,
}

impl Orchestrator {
    pub fn new(config: &AppConfig, collaborators: Collaborators) -> Self {
        let Collaborators {
            chat,
            community,
            notifier,
            clock,
        } = collaborators.clone();

        let rewards = Arc::new(config.reward_table());
        let grants = GrantLogs::from_config(&config.grants);
        let executor = Arc::new(ActionExecutor::new(
            chat.clone(),
            community,
            notifier,
            rewards.clone(),
            grants.clone(),
            clock.clone(),
        ));

        Self {
            config: config.orchestrator(),
            queue: queue::shared(TaskQueue::new()),
            store: TaskStore::from_config(&config.store),
            executor,
            expiry: ExpiryTracker::new(grants, rewards.clone(), chat, clock.clone()),
            refresher: CredentialRefresher::new(&config.credentials, clock),
            liveness: LivenessMonitor::new(config.channel.name.clone()),
            rewards,
            collaborators,
            ready: ReadyFlag::default(),
            observed_empty: false,
        }
    }

    pub fn queue(&self) -> SharedQueue {
        Arc::clone(&self.queue)
    }

    pub fn ready(&self) -> ReadyFlag {
        self.ready.clone()
    }

    pub fn instant_loop(&self) -> InstantLoop {
        InstantLoop::new(
            self.queue(),
            Arc::clone(&self.executor),
            self.ready(),
            self.config.instant_interval,
        )
    }

    /// Load persisted tasks. Call once before `spawn`.
    pub async fn restore(&mut self) -> Result<QueueCounts, StoreError> {
        let now = self.collaborators.clock.now();
        let mut queue = self.queue.lock().await;
        self.store.load(&mut queue, now)
    }

    /// One main-loop iteration.
    pub async fn tick(&mut self) -> TickSummary {
        let mut summary = TickSummary {
            ready: self.promote_ready(),
            ..TickSummary::default()
        };

        if summary.ready {
            summary.revoked = self.expiry.tick().await.len();
            summary.executed = self.drain().await;
            summary.refreshed = self.refresher.tick(self.collaborators.chat.as_ref()).await;
            self.liveness
                .check(
                    self.collaborators.chat.as_ref(),
                    self.collaborators.notifier.as_ref(),
                )
                .await;
        }

        // 保存は ready に関係なく毎 tick 判定する
        summary.saved = self.persist().await;
        debug!(?summary, "tick complete");
        summary
    }

    fn promote_ready(&self) -> bool {
        if self.ready.is_ready() {
            return true;
        }
        if !(self.collaborators.chat.is_loaded() && self.collaborators.community.is_loaded()) {
            return false;
        }
        if self.ready.mark_ready() {
            let rule = "=".repeat(48);
            info!("{rule}");
            info!(
                interval_secs = self.config.interval.as_secs(),
                instant_interval_ms = self.config.instant_interval.as_millis() as u64,
                rewards = self.rewards.entries().len(),
                "all platforms loaded, orchestrator is ready"
            );
            info!("{rule}");
        }
        true
    }

    /// Run every task that was pending when the drain started, oldest first.
    async fn drain(&mut self) -> usize {
        let batch = self.queue.lock().await.pending_count();
        if batch == 0 {
            if !self.observed_empty {
                info!("task queue is empty");
                self.observed_empty = true;
            }
            return 0;
        }
        self.observed_empty = false;

        let mut executed = 0;
        for position in 1..=batch {
            let dequeued = self.queue.lock().await.dequeue();
            let task = match dequeued {
                Ok(task) => task,
                Err(err) => {
                    warn!(error = %err, "pending lane shrank during drain");
                    break;
                }
            };
            info!(
                position,
                batch,
                task_id = %task.id(),
                action = %task.action(),
                "executing task from queue"
            );
            settle(&self.executor, &self.queue, task).await;
            executed += 1;
        }
        executed
    }

    /// Save if any persisted collection changed size. Failures are logged and the
    /// save is retried on the next tick.
    async fn persist(&mut self) -> bool {
        let tasks = {
            let queue = self.queue.lock().await;
            if !self.store.needs_save(&queue.counts()) {
                return false;
            }
            queue.persisted()
        };

        match self.store.save(&tasks) {
            Ok(()) => true,
            Err(err) => {
                error!(error = %err, "failed to save task store");
                false
            }
        }
    }

    fn current_interval(&self) -> Duration {
        if self.ready.is_ready() {
            self.config.interval
        } else {
            self.config.not_ready_interval
        }
    }

    async fn redeem(&mut self, redemption: RewardRedemption) -> Vec<TaskId> {
        info!(
            user = %redemption.user_name,
            reward = %redemption.reward_name,
            cost = redemption.reward_cost,
            input = redemption.input().unwrap_or(""),
            "reward redeemed"
        );

        let drafts = self.rewards.drafts_for(&redemption);
        if drafts.is_empty() {
            info!(reward = %redemption.reward_name, "redemption matches no configured reward");
            return Vec::new();
        }

        let now = self.collaborators.clock.now();
        let ids: Vec<TaskId> = {
            let mut queue = self.queue.lock().await;
            drafts
                .into_iter()
                .map(|draft| queue.submit(draft, now))
                .collect()
        };

        if let Err(err) = self
            .collaborators
            .chat
            .send_chat_message(&redemption.announcement())
            .await
        {
            warn!(error = %err, "redemption announcement failed");
        }
        ids
    }

    pub(crate) async fn apply(&mut self, command: DashboardCommand) {
        debug!(?command, "dashboard command");
        // 返信先が既に drop されていても無視する
        match command {
            DashboardCommand::Submit { draft, reply } => {
                let now = self.collaborators.clock.now();
                let result = dashboard::submit(&mut *self.queue.lock().await, draft, now);
                let _ = reply.send(result);
            }
            DashboardCommand::Redeem { redemption, reply } => {
                let ids = self.redeem(redemption).await;
                let _ = reply.send(ids);
            }
            DashboardCommand::Get { id, reply } => {
                let view = dashboard::view(&*self.queue.lock().await, id);
                let _ = reply.send(view);
            }
            DashboardCommand::Transition {
                id,
                transition,
                reply,
            } => {
                let result = dashboard::apply_transition(&mut *self.queue.lock().await, id, transition);
                let _ = reply.send(result);
            }
            DashboardCommand::Snapshot { reply } => {
                let snapshot = self.queue.lock().await.snapshot();
                let _ = reply.send(snapshot);
            }
        }
    }

    /// Spawn the main loop and the instant loop.
    pub fn spawn(self) -> OrchestratorHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);

        let instant = tokio::spawn(self.instant_loop().run(shutdown_rx.clone()));
        let main = tokio::spawn(self.run(command_rx, shutdown_rx, instant));

        OrchestratorHandle {
            shutdown_tx,
            main,
            dashboard: Dashboard::new(command_tx),
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<DashboardCommand>,
        mut shutdown_rx: watch::Receiver<bool>,
        instant: JoinHandle<()>,
    ) {
        info!("orchestrator started");
        'ticks: loop {
            if *shutdown_rx.borrow() {
                break;
            }

            let started = Instant::now();
            self.tick().await;
            let sleep = tokio::time::sleep(next_sleep(self.current_interval(), started.elapsed()));
            tokio::pin!(sleep);

            // 待ち時間中にダッシュボードのコマンドを処理する
            loop {
                tokio::select! {
                    _ = &mut sleep => break,
                    changed = shutdown_rx.changed() => {
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break 'ticks;
                        }
                    }
                    Some(command) = commands.recv() => self.apply(command).await,
                }
            }
        }

        // instant ループが実行中のタスクを片付けてから最後の保存をする
        if let Err(err) = instant.await {
            error!(error = %err, "instant loop panicked");
        }
        self.persist().await;
        info!("orchestrator stopped");
    }
}

/// Handle to the spawned loops.
/// - `dashboard()` で運用者コマンド用のハンドルを取得
/// - `shutdown_and_join()` で両ループの終了を待つ（実行中のタスクは最後まで走る）
///
/// The main loop owns the instant loop's join handle and saves only after it has
/// stopped, so joining the main loop covers both.
pub struct OrchestratorHandle {
    shutdown_tx: watch::Sender<bool>,
    main: JoinHandle<()>,
    dashboard: Dashboard,
}

impl OrchestratorHandle {
    pub fn dashboard(&self) -> Dashboard {
        self.dashboard.clone()
    }

    pub fn request_shutdown(&self) {
        // ignore send error: receivers may already be dropped
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        if let Err(err) = self.main.await {
            error!(error = %err, "orchestrator loop panicked");
        }
    }
}
