//! Application configuration.
//!
//! One TOML document split into per-component structs at construction time. Each
//! component only sees the fields it needs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::domain::{ActionKind, RewardConfig, RewardTable};
use crate::error::ConfigError;
use crate::grants::TimestampZone;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Main loop tick once ready, in seconds.
    pub interval_secs: u64,
    pub instant_interval_ms: u64,
    pub not_ready_interval_ms: u64,
    pub store: StoreConfig,
    pub grants: GrantLogConfig,
    pub credentials: CredentialConfig,
    pub channel: ChannelConfig,
    pub logging: LoggingConfig,
    pub rewards: Vec<RewardConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            instant_interval_ms: 1_000,
            not_ready_interval_ms: 1_000,
            store: StoreConfig::default(),
            grants: GrantLogConfig::default(),
            credentials: CredentialConfig::default(),
            channel: ChannelConfig::default(),
            logging: LoggingConfig::default(),
            rewards: Vec::new(),
        }
    }
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_secs == 0 {
            return Err(invalid("interval_secs must be positive"));
        }
        if self.instant_interval_ms == 0 || self.not_ready_interval_ms == 0 {
            return Err(invalid("loop intervals must be positive"));
        }
        if self.credentials.refresh_interval_secs == 0 {
            return Err(invalid("credentials.refresh_interval_secs must be positive"));
        }

        for reward in &self.rewards {
            if reward.name.trim().is_empty() {
                return Err(invalid("reward names must not be empty"));
            }
            match reward.action {
                ActionKind::Timeout if reward.duration.is_none_or(|secs| secs == 0) => {
                    return Err(invalid(format!(
                        "reward `{}` times users out but has no duration",
                        reward.name
                    )));
                }
                ActionKind::RoleGrant | ActionKind::RoleRevoke
                    if reward.role.as_deref().is_none_or(|role| role.trim().is_empty()) =>
                {
                    return Err(invalid(format!("reward `{}` has no role", reward.name)));
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            interval: Duration::from_secs(self.interval_secs),
            instant_interval: Duration::from_millis(self.instant_interval_ms),
            not_ready_interval: Duration::from_millis(self.not_ready_interval_ms),
        }
    }

    pub fn reward_table(&self) -> RewardTable {
        RewardTable::new(self.rewards.clone())
    }
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(message.into())
}

/// Loop pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    pub interval: Duration,
    pub instant_interval: Duration,
    pub not_ready_interval: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        AppConfig::default().orchestrator()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/tasks.toml"),
        }
    }
}

/// Append-only grant logs read by the expiry tracker.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GrantLogConfig {
    pub moderators: PathBuf,
    pub vips: PathBuf,
    /// `utc` (default) or `local` for logs written in server local time.
    pub timezone: TimestampZone,
}

impl Default for GrantLogConfig {
    fn default() -> Self {
        Self {
            moderators: PathBuf::from("data/rewards/moderators.txt"),
            vips: PathBuf::from("data/rewards/vips.txt"),
            timezone: TimestampZone::Utc,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CredentialConfig {
    pub refresh_interval_secs: u64,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 3 * 60 * 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub name: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            name: "channel".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const SAMPLE: &str = r#"
interval_secs = 5

[store]
path = "state/tasks.toml"

[grants]
timezone = "local"

[channel]
name = "valkyrie"

[[rewards]]
name = "Timeout Someone"
action = "twitch_timeout"
instant = true
time = 120

[[rewards]]
name = "Supporter Role"
action = "role_grant"
role = "Supporter"
"#;

    #[test]
    fn parses_sample_with_defaults() {
        let config = AppConfig::from_toml_str(SAMPLE).unwrap();

        assert_eq!(config.orchestrator().interval, Duration::from_secs(5));
        assert_eq!(config.orchestrator().instant_interval, Duration::from_secs(1));
        assert_eq!(config.store.path, PathBuf::from("state/tasks.toml"));
        assert_eq!(config.grants.moderators, PathBuf::from("data/rewards/moderators.txt"));
        assert_eq!(config.grants.timezone, TimestampZone::Local);
        assert_eq!(config.credentials.refresh_interval_secs, 10_800);

        let table = config.reward_table();
        let timeout = table.find("timeout someone").unwrap();
        assert_eq!(timeout.action, ActionKind::Timeout);
        assert_eq!(timeout.duration, Some(120));
        assert!(timeout.instant);
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.interval_secs, 10);
        assert!(config.rewards.is_empty());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.grants.timezone, TimestampZone::Utc);
    }

    #[rstest]
    #[case::zero_interval("interval_secs = 0")]
    #[case::timeout_without_duration(
        "[[rewards]]\nname = \"t\"\naction = \"timeout\""
    )]
    #[case::role_without_role("[[rewards]]\nname = \"r\"\naction = \"role_grant\"")]
    fn rejects_invalid_values(#[case] raw: &str) {
        assert!(matches!(
            AppConfig::from_toml_str(raw),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn rejects_unknown_reward_action() {
        let raw = "[[rewards]]\nname = \"x\"\naction = \"launch_rocket\"";
        assert!(matches!(AppConfig::from_toml_str(raw), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = AppConfig::load(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
