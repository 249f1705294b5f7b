//! Dry-run adapters - 外部呼び出しをログに出すだけの実装
//!
//! Useful for running the orchestrator locally: every call is logged through
//! `tracing` and succeeds. The stream is always reported offline.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::error::PlatformError;
use crate::ports::{ChatPlatform, CommunityPlatform, CredentialKind, Notifier};

#[derive(Debug, Clone)]
pub struct DryRunChat {
    channel: String,
}

impl DryRunChat {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
        }
    }
}

#[async_trait]
impl ChatPlatform for DryRunChat {
    fn is_loaded(&self) -> bool {
        true
    }

    async fn add_moderator(&self, user: &str) -> Result<(), PlatformError> {
        info!(channel = %self.channel, user, "[dry-run] add moderator");
        Ok(())
    }

    async fn remove_moderator(&self, user: &str) -> Result<(), PlatformError> {
        info!(channel = %self.channel, user, "[dry-run] remove moderator");
        Ok(())
    }

    async fn add_vip(&self, user: &str) -> Result<(), PlatformError> {
        info!(channel = %self.channel, user, "[dry-run] add vip");
        Ok(())
    }

    async fn remove_vip(&self, user: &str) -> Result<(), PlatformError> {
        info!(channel = %self.channel, user, "[dry-run] remove vip");
        Ok(())
    }

    async fn timeout(&self, user: &str, duration: Duration, reason: &str) -> Result<(), PlatformError> {
        info!(
            channel = %self.channel,
            user,
            secs = duration.as_secs(),
            reason,
            "[dry-run] timeout"
        );
        Ok(())
    }

    async fn send_chat_message(&self, message: &str) -> Result<(), PlatformError> {
        info!(channel = %self.channel, text = message, "[dry-run] chat message");
        Ok(())
    }

    async fn live_status(&self) -> Result<bool, PlatformError> {
        Ok(false)
    }

    async fn refresh_credential(&self, kind: CredentialKind) -> Result<(), PlatformError> {
        info!(credential = %kind, "[dry-run] refresh credential");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunCommunity;

#[async_trait]
impl CommunityPlatform for DryRunCommunity {
    fn is_loaded(&self) -> bool {
        true
    }

    async fn grant_role(&self, user: &str, role: &str) -> Result<(), PlatformError> {
        info!(user, role, "[dry-run] grant role");
        Ok(())
    }

    async fn revoke_role(&self, user: &str, role: &str) -> Result<(), PlatformError> {
        info!(user, role, "[dry-run] revoke role");
        Ok(())
    }
}

/// Sends announcements to the log instead of a channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, message: &str) -> Result<(), PlatformError> {
        info!(target: "tribute::announce", text = message, "announcement");
        Ok(())
    }

    async fn log(&self, message: &str) -> Result<(), PlatformError> {
        info!(target: "tribute::oplog", text = message, "operator log");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dry_run_adapters_always_succeed() {
        let chat = DryRunChat::new("valkyrie");
        assert!(ChatPlatform::is_loaded(&chat));
        assert_eq!(chat.live_status().await, Ok(false));
        assert!(chat.timeout("bob", Duration::from_secs(5), "test").await.is_ok());
        assert!(DryRunCommunity.grant_role("bob", "Supporter").await.is_ok());
        assert!(TracingNotifier.notify("hello").await.is_ok());
    }
}
