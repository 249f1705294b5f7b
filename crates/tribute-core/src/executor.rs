//! Action dispatch: one task, one side effect.
//!
//! Design:
//! - `execute` matches on the closed [`ActionKind`] set; only tasks restored from
//!   disk (or typed in by an operator) can carry an unknown action.
//! - Each handler makes exactly one platform call, records the grant if the action
//!   expires, then posts a line to the operator log.
//! - Every failure is returned to the caller, which moves the task to `errored`.
//!   Nothing is retried here.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::domain::{ActionKind, RewardTable, Task, TaskAction, keys};
use crate::error::ExecutionError;
use crate::grants::{GrantEntry, GrantKind, GrantLogs};
use crate::ports::{ChatPlatform, Clock, CommunityPlatform, Notifier};

pub struct ActionExecutor {
    chat: Arc<dyn ChatPlatform>,
    community: Arc<dyn CommunityPlatform>,
    notifier: Arc<dyn Notifier>,
    rewards: Arc<RewardTable>,
    grants: GrantLogs,
    clock: Arc<dyn Clock>,
}

impl ActionExecutor {
    pub fn new(
        chat: Arc<dyn ChatPlatform>,
        community: Arc<dyn CommunityPlatform>,
        notifier: Arc<dyn Notifier>,
        rewards: Arc<RewardTable>,
        grants: GrantLogs,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            chat,
            community,
            notifier,
            rewards,
            grants,
            clock,
        }
    }

    /// Execute one task.
    pub async fn execute(&self, task: &Task) -> Result<(), ExecutionError> {
        info!(
            task_id = %task.id(),
            action = %task.action(),
            payload = ?task.payload(),
            "executing task"
        );

        let result = self.dispatch(task).await;
        if let Err(err) = &result {
            self.report_failure(task, err).await;
        }
        result
    }

    async fn dispatch(&self, task: &Task) -> Result<(), ExecutionError> {
        let kind = match task.action() {
            TaskAction::Known(kind) => *kind,
            TaskAction::Unknown(raw) => return Err(ExecutionError::UnknownAction(raw.clone())),
        };

        match kind {
            ActionKind::ModeratorGrant => {
                let user = target(task, kind)?;
                self.chat.add_moderator(user).await?;
                self.record_grant(GrantKind::Moderator, user).await?;
                self.announce(format!("Added Twitch Moderator | {user}")).await;
            }
            ActionKind::ModeratorRevoke => {
                let user = target(task, kind)?;
                self.chat.remove_moderator(user).await?;
                self.announce(format!("Removed Twitch Moderator | {user}")).await;
            }
            ActionKind::VipGrant => {
                let user = target(task, kind)?;
                self.chat.add_vip(user).await?;
                self.record_grant(GrantKind::Vip, user).await?;
                self.announce(format!("Added Twitch VIP | {user}")).await;
            }
            ActionKind::VipRevoke => {
                let user = target(task, kind)?;
                self.chat.remove_vip(user).await?;
                self.announce(format!("Removed Twitch VIP | {user}")).await;
            }
            ActionKind::Timeout => {
                let user = target(task, kind)?;
                let secs = self.timeout_duration(task)?;
                self.chat
                    .timeout(user, Duration::from_secs(secs), &timeout_reason(task))
                    .await?;
                self.announce(format!("Timed out Twitch User | {user} | {secs} seconds"))
                    .await;
            }
            ActionKind::RoleGrant => {
                let user = target(task, kind)?;
                let role = self.role(task, kind)?;
                self.community.grant_role(user, &role).await?;
                self.announce(format!("Assigned Discord Role | {user} | {role}")).await;
            }
            ActionKind::RoleRevoke => {
                let user = target(task, kind)?;
                let role = self.role(task, kind)?;
                self.community.revoke_role(user, &role).await?;
                self.announce(format!("Removed Discord Role | {user} | {role}")).await;
            }
            ActionKind::Special => return Err(ExecutionError::NotImplemented(kind)),
        }
        Ok(())
    }

    /// Duration comes from the reward the task was redeemed for; tasks without a
    /// reward (operator submissions) carry their own.
    fn timeout_duration(&self, task: &Task) -> Result<u64, ExecutionError> {
        let secs = match task.field(keys::REWARD_NAME) {
            Some(reward_name) => {
                let reward = self
                    .rewards
                    .find(reward_name)
                    .ok_or_else(|| ExecutionError::UnknownReward(reward_name.to_string()))?;
                reward.duration.or(task.duration_secs())
            }
            None => task.duration_secs(),
        };

        secs.filter(|secs| *secs > 0)
            .ok_or(ExecutionError::MissingField {
                action: ActionKind::Timeout,
                field: "duration",
            })
    }

    fn role(&self, task: &Task, kind: ActionKind) -> Result<String, ExecutionError> {
        let from_reward = || {
            task.field(keys::REWARD_NAME)
                .and_then(|name| self.rewards.find(name))
                .and_then(|reward| reward.role.clone())
        };

        task.role()
            .map(str::to_string)
            .or_else(from_reward)
            .filter(|role| !role.trim().is_empty())
            .ok_or(ExecutionError::MissingField {
                action: kind,
                field: "role",
            })
    }

    async fn record_grant(&self, kind: GrantKind, user: &str) -> Result<(), ExecutionError> {
        let log = self.grants.get(kind);
        let entry = GrantEntry {
            granted_at: self.clock.now(),
            user: user.to_string(),
        };
        log.append(&entry).await.map_err(|source| ExecutionError::GrantLog {
            path: log.path().to_path_buf(),
            source,
        })
    }

    async fn announce(&self, message: String) {
        info!(text = %message, "action performed");
        if let Err(err) = self.notifier.log(&message).await {
            warn!(error = %err, "operator log unavailable");
        }
    }

    async fn report_failure(&self, task: &Task, err: &ExecutionError) {
        warn!(task_id = %task.id(), action = %task.action(), error = %err, "task failed");

        let message = match err {
            ExecutionError::UnknownAction(raw) => format!("Unknown task action: {raw}"),
            ExecutionError::UnknownReward(name) => format!("Unknown Reward Redemption | {name}"),
            ExecutionError::NotImplemented(kind) => format!("Not implemented: {kind}"),
            _ => return,
        };
        if let Err(err) = self.notifier.log(&message).await {
            warn!(error = %err, "operator log unavailable");
        }
    }
}

fn target(task: &Task, kind: ActionKind) -> Result<&str, ExecutionError> {
    task.target().ok_or(ExecutionError::MissingField {
        action: kind,
        field: keys::USER_NAME,
    })
}

fn timeout_reason(task: &Task) -> String {
    let redeemer = task.field(keys::USER_NAME).unwrap_or("a moderator");
    match task.field(keys::REWARD_COST) {
        Some(cost) => format!("{redeemer} has timed you out for {cost} channel points!"),
        None => format!("{redeemer} has timed you out!"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    use crate::domain::{RewardConfig, TaskDraft, TaskId};
    use crate::ports::FixedClock;
    use crate::testing::{PlatformCall, RecordingNotifier, RecordingPlatform};

    struct Fixture {
        _dir: tempfile::TempDir,
        platform: Arc<RecordingPlatform>,
        notifier: Arc<RecordingNotifier>,
        grants: GrantLogs,
        executor: ActionExecutor,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let grants = GrantLogs {
            moderators: crate::grants::GrantLog::new(dir.path().join("moderators.txt")),
            vips: crate::grants::GrantLog::new(dir.path().join("vips.txt")),
        };
        let platform = Arc::new(RecordingPlatform::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let rewards = RewardTable::new(vec![
            RewardConfig {
                name: "Timeout Someone".into(),
                action: ActionKind::Timeout,
                instant: true,
                duration: Some(300),
                role: None,
            },
            RewardConfig {
                name: "Supporter".into(),
                action: ActionKind::RoleGrant,
                instant: false,
                duration: None,
                role: Some("Supporter".into()),
            },
        ]);
        let executor = ActionExecutor::new(
            platform.clone(),
            platform.clone(),
            notifier.clone(),
            Arc::new(rewards),
            grants.clone(),
            Arc::new(FixedClock::new(DateTime::from_timestamp(1_700_000_000, 0).unwrap())),
        );
        Fixture {
            _dir: dir,
            platform,
            notifier,
            grants,
            executor,
        }
    }

    fn task(draft: TaskDraft) -> Task {
        Task::new(TaskId::new(1), draft, DateTime::<Utc>::UNIX_EPOCH)
    }

    #[tokio::test]
    async fn vip_grant_calls_platform_and_records_grant() {
        let f = fixture();
        let t = task(TaskDraft::new(ActionKind::VipGrant, false).with_field(keys::USER_NAME, "alice"));

        f.executor.execute(&t).await.unwrap();

        assert_eq!(f.platform.calls(), vec![PlatformCall::AddVip("alice".into())]);
        assert_eq!(
            f.grants.vips.lines().unwrap(),
            vec!["2023-11-14 22:13:20|alice".to_string()]
        );
        assert_eq!(f.notifier.logs(), vec!["Added Twitch VIP | alice".to_string()]);
    }

    #[tokio::test]
    async fn moderator_grant_prefers_user_input() {
        let f = fixture();
        let t = task(
            TaskDraft::new(ActionKind::ModeratorGrant, false)
                .with_field(keys::USER_NAME, "alice")
                .with_field(keys::USER_INPUT, "bob"),
        );

        f.executor.execute(&t).await.unwrap();

        assert_eq!(f.platform.calls(), vec![PlatformCall::AddModerator("bob".into())]);
        assert!(f.grants.moderators.lines().unwrap()[0].ends_with("|bob"));
    }

    #[tokio::test]
    async fn timeout_uses_reward_duration() {
        let f = fixture();
        let t = task(
            TaskDraft::new(ActionKind::Timeout, true)
                .with_field(keys::USER_NAME, "alice")
                .with_field(keys::USER_INPUT, "bob")
                .with_field(keys::REWARD_NAME, "timeout someone")
                .with_field(keys::REWARD_COST, "100")
                .with_duration(5),
        );

        f.executor.execute(&t).await.unwrap();

        assert_eq!(
            f.platform.calls(),
            vec![PlatformCall::Timeout {
                user: "bob".into(),
                secs: 300
            }]
        );
        assert_eq!(
            f.notifier.logs(),
            vec!["Timed out Twitch User | bob | 300 seconds".to_string()]
        );
    }

    #[tokio::test]
    async fn timeout_without_reward_uses_task_duration() {
        let f = fixture();
        let t = task(
            TaskDraft::new(ActionKind::Timeout, false)
                .with_field(keys::USER_NAME, "bob")
                .with_duration(42),
        );

        f.executor.execute(&t).await.unwrap();

        assert_eq!(
            f.platform.calls(),
            vec![PlatformCall::Timeout {
                user: "bob".into(),
                secs: 42
            }]
        );
    }

    #[tokio::test]
    async fn timeout_for_unknown_reward_fails_and_is_reported() {
        let f = fixture();
        let t = task(
            TaskDraft::new(ActionKind::Timeout, false)
                .with_field(keys::USER_NAME, "bob")
                .with_field(keys::REWARD_NAME, "Retired Reward"),
        );

        let err = f.executor.execute(&t).await.unwrap_err();

        assert!(matches!(err, ExecutionError::UnknownReward(name) if name == "Retired Reward"));
        assert!(f.platform.calls().is_empty());
        assert_eq!(
            f.notifier.logs(),
            vec!["Unknown Reward Redemption | Retired Reward".to_string()]
        );
    }

    #[tokio::test]
    async fn role_grant_falls_back_to_reward_role() {
        let f = fixture();
        let t = task(
            TaskDraft::new(ActionKind::RoleGrant, false)
                .with_field(keys::USER_NAME, "carol")
                .with_field(keys::REWARD_NAME, "Supporter"),
        );

        f.executor.execute(&t).await.unwrap();

        assert_eq!(
            f.platform.calls(),
            vec![PlatformCall::GrantRole {
                user: "carol".into(),
                role: "Supporter".into()
            }]
        );
    }

    #[tokio::test]
    async fn unknown_action_sends_one_operator_message() {
        let f = fixture();
        let t = task(TaskDraft::new(TaskAction::parse("bogus"), true));

        let err = f.executor.execute(&t).await.unwrap_err();

        assert!(matches!(err, ExecutionError::UnknownAction(raw) if raw == "bogus"));
        assert_eq!(f.notifier.logs(), vec!["Unknown task action: bogus".to_string()]);
    }

    #[tokio::test]
    async fn special_is_not_implemented() {
        let f = fixture();
        let t = task(TaskDraft::new(ActionKind::Special, false));

        let err = f.executor.execute(&t).await.unwrap_err();

        assert!(matches!(err, ExecutionError::NotImplemented(ActionKind::Special)));
        assert_eq!(f.notifier.logs(), vec!["Not implemented: special".to_string()]);
    }

    #[tokio::test]
    async fn platform_failure_is_returned_without_grant_record() {
        let f = fixture();
        f.platform.fail_on("add_moderator");
        let t = task(TaskDraft::new(ActionKind::ModeratorGrant, false).with_field(keys::USER_NAME, "a"));

        let err = f.executor.execute(&t).await.unwrap_err();

        assert!(matches!(err, ExecutionError::Platform(_)));
        assert!(f.grants.moderators.lines().unwrap().is_empty());
        assert!(f.notifier.logs().is_empty());
    }

    #[tokio::test]
    async fn missing_target_fails() {
        let f = fixture();
        let t = task(TaskDraft::new(ActionKind::VipRevoke, false));

        let err = f.executor.execute(&t).await.unwrap_err();

        assert!(matches!(err, ExecutionError::MissingField { field: "user_name", .. }));
        assert!(f.platform.calls().is_empty());
    }
}
