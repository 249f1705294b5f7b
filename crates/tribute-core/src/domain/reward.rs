//! Reward configuration and redemption intake.

use serde::{Deserialize, Serialize};

use super::task::keys;
use super::{ActionKind, TaskDraft};

/// Maps one redeemable reward to the action it triggers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardConfig {
    pub name: String,
    pub action: ActionKind,
    #[serde(default)]
    pub instant: bool,
    /// Timeout length, or how long a moderator/VIP grant lasts before expiry.
    #[serde(default, alias = "time", skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl RewardConfig {
    pub fn matches(&self, reward_name: &str) -> bool {
        self.name.trim().eq_ignore_ascii_case(reward_name.trim())
    }
}

/// Reward entries in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewardTable {
    entries: Vec<RewardConfig>,
}

impl RewardTable {
    pub fn new(entries: Vec<RewardConfig>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[RewardConfig] {
        &self.entries
    }

    /// First entry with this name (case-insensitive).
    pub fn find(&self, reward_name: &str) -> Option<&RewardConfig> {
        self.entries.iter().find(|entry| entry.matches(reward_name))
    }

    /// First entry configured for `action`.
    ///
    /// Only the first one counts when several rewards share an action; the expiry
    /// tracker relies on this to pick a single duration per privilege kind.
    pub fn first_for(&self, action: ActionKind) -> Option<&RewardConfig> {
        self.entries.iter().find(|entry| entry.action == action)
    }

    /// One draft per matching entry. An unmatched redemption yields nothing.
    pub fn drafts_for(&self, redemption: &RewardRedemption) -> Vec<TaskDraft> {
        self.entries
            .iter()
            .filter(|entry| entry.matches(&redemption.reward_name))
            .map(|entry| {
                let mut draft = TaskDraft::new(entry.action, entry.instant)
                    .with_field(keys::USER_NAME, redemption.user_name.clone())
                    .with_field(keys::REWARD_NAME, redemption.reward_name.clone())
                    .with_field(keys::REWARD_COST, redemption.reward_cost.to_string());
                if let Some(input) = redemption.input() {
                    draft = draft.with_field(keys::USER_INPUT, input);
                }
                draft.duration_secs = entry.duration;
                draft.role = entry.role.clone();
                draft
            })
            .collect()
    }
}

/// A viewer redeemed a reward on the streaming platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardRedemption {
    pub user_name: String,
    pub reward_name: String,
    pub reward_cost: u64,
    #[serde(default)]
    pub user_input: Option<String>,
}

impl RewardRedemption {
    pub fn new(user_name: impl Into<String>, reward_name: impl Into<String>, reward_cost: u64) -> Self {
        Self {
            user_name: user_name.into(),
            reward_name: reward_name.into(),
            reward_cost,
            user_input: None,
        }
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.user_input = Some(input.into());
        self
    }

    pub fn input(&self) -> Option<&str> {
        self.user_input
            .as_deref()
            .map(str::trim)
            .filter(|input| !input.is_empty())
    }

    /// Line posted to chat when the redemption is accepted.
    pub fn announcement(&self) -> String {
        match self.input() {
            Some(input) => format!(
                "[CHANNEL POINTS] {} redeemed \"{}\" ({} points): {}",
                self.user_name, self.reward_name, self.reward_cost, input
            ),
            None => format!(
                "[CHANNEL POINTS] {} redeemed \"{}\" ({} points)",
                self.user_name, self.reward_name, self.reward_cost
            ),
        }
    }
}
