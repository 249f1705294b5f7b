//! Action kinds a task can carry.

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// The closed set of side effects the executor knows how to perform.
///
/// Parsing is case-insensitive and also accepts the names older task files and
/// reward tables use (`twitch_moderator`, `twitch_vip`, `twitch_timeout`, `discord_role`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum ActionKind {
    ModeratorGrant,
    ModeratorRevoke,
    VipGrant,
    VipRevoke,
    Timeout,
    RoleGrant,
    RoleRevoke,
    Special,
}

impl ActionKind {
    pub const ALL: [ActionKind; 8] = [
        ActionKind::ModeratorGrant,
        ActionKind::ModeratorRevoke,
        ActionKind::VipGrant,
        ActionKind::VipRevoke,
        ActionKind::Timeout,
        ActionKind::RoleGrant,
        ActionKind::RoleRevoke,
        ActionKind::Special,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            ActionKind::ModeratorGrant => "moderator_grant",
            ActionKind::ModeratorRevoke => "moderator_revoke",
            ActionKind::VipGrant => "vip_grant",
            ActionKind::VipRevoke => "vip_revoke",
            ActionKind::Timeout => "timeout",
            ActionKind::RoleGrant => "role_grant",
            ActionKind::RoleRevoke => "role_revoke",
            ActionKind::Special => "special",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
        let kind = match normalized.as_str() {
            "moderator_grant" | "twitch_moderator" => ActionKind::ModeratorGrant,
            "moderator_revoke" => ActionKind::ModeratorRevoke,
            "vip_grant" | "twitch_vip" => ActionKind::VipGrant,
            "vip_revoke" => ActionKind::VipRevoke,
            "timeout" | "twitch_timeout" => ActionKind::Timeout,
            "role_grant" | "discord_role" => ActionKind::RoleGrant,
            "role_revoke" => ActionKind::RoleRevoke,
            "special" => ActionKind::Special,
            _ => return None,
        };
        Some(kind)
    }

    /// Whether the action operates on a user named in the payload.
    pub const fn requires_target(self) -> bool {
        !matches!(self, ActionKind::Special)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<ActionKind> for &'static str {
    fn from(kind: ActionKind) -> Self {
        kind.as_str()
    }
}

impl TryFrom<String> for ActionKind {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        ActionKind::parse(&raw).ok_or_else(|| format!("unknown action `{raw}`"))
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        ActionKind::parse(raw).ok_or_else(|| format!("unknown action `{raw}`"))
    }
}

/// The action stored on a task.
///
/// Tasks restored from disk or submitted by an operator may name an action this
/// build does not know; those are kept verbatim so they can be reported and land
/// in `errored` instead of being dropped at load time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskAction {
    Known(ActionKind),
    Unknown(String),
}

impl TaskAction {
    pub fn parse(raw: &str) -> Self {
        match ActionKind::parse(raw) {
            Some(kind) => TaskAction::Known(kind),
            None => TaskAction::Unknown(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TaskAction::Known(kind) => kind.as_str(),
            TaskAction::Unknown(raw) => raw,
        }
    }

    pub fn kind(&self) -> Option<ActionKind> {
        match self {
            TaskAction::Known(kind) => Some(*kind),
            TaskAction::Unknown(_) => None,
        }
    }
}

impl From<ActionKind> for TaskAction {
    fn from(kind: ActionKind) -> Self {
        TaskAction::Known(kind)
    }
}

impl fmt::Display for TaskAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TaskAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("vip_grant", ActionKind::VipGrant)]
    #[case("VIP-GRANT", ActionKind::VipGrant)]
    #[case("twitch_vip", ActionKind::VipGrant)]
    #[case("twitch_moderator", ActionKind::ModeratorGrant)]
    #[case("twitch_timeout", ActionKind::Timeout)]
    #[case("discord_role", ActionKind::RoleGrant)]
    #[case(" special ", ActionKind::Special)]
    fn parses_canonical_and_legacy_names(#[case] raw: &str, #[case] expected: ActionKind) {
        assert_eq!(ActionKind::parse(raw), Some(expected));
    }

    #[test]
    fn canonical_names_round_trip() {
        for kind in ActionKind::ALL {
            assert_eq!(ActionKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn unknown_actions_are_preserved_verbatim() {
        let action = TaskAction::parse("bogus");
        assert_eq!(action, TaskAction::Unknown("bogus".to_string()));
        assert_eq!(action.as_str(), "bogus");
        assert_eq!(action.kind(), None);
    }

    #[test]
    fn deserializes_from_reward_config_strings() {
        #[derive(Debug, Deserialize)]
        struct Row {
            action: ActionKind,
        }

        let row: Row = toml::from_str(r#"action = "twitch_vip""#).unwrap();
        assert_eq!(row.action, ActionKind::VipGrant);

        let err = toml::from_str::<Row>(r#"action = "nope""#).unwrap_err();
        assert!(err.to_string().contains("unknown action"));
    }
}
