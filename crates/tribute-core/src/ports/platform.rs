//! Platform ports - 外部プラットフォームの抽象化
//!
//! The core never speaks a chat protocol itself. These traits are the whole surface
//! it needs; real clients (and the dry-run adapters in `impls`) implement them.
//! Every call is a suspension point and may fail; a failure or timeout only ever
//! affects the task that made the call.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::PlatformError;

/// Which OAuth identity a refresh applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialKind {
    /// The broadcaster account used for moderation calls.
    Viewer,
    /// The bot account used for chat.
    Bot,
}

impl CredentialKind {
    pub const ALL: [CredentialKind; 2] = [CredentialKind::Viewer, CredentialKind::Bot];
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialKind::Viewer => f.write_str("viewer"),
            CredentialKind::Bot => f.write_str("bot"),
        }
    }
}

/// Streaming/chat platform (moderation, chat, stream status, credentials).
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// True once the client finished its own startup.
    fn is_loaded(&self) -> bool;

    async fn add_moderator(&self, user: &str) -> Result<(), PlatformError>;

    async fn remove_moderator(&self, user: &str) -> Result<(), PlatformError>;

    async fn add_vip(&self, user: &str) -> Result<(), PlatformError>;

    async fn remove_vip(&self, user: &str) -> Result<(), PlatformError>;

    async fn timeout(&self, user: &str, duration: Duration, reason: &str) -> Result<(), PlatformError>;

    async fn send_chat_message(&self, message: &str) -> Result<(), PlatformError>;

    /// Whether the channel is currently streaming.
    async fn live_status(&self) -> Result<bool, PlatformError>;

    async fn refresh_credential(&self, kind: CredentialKind) -> Result<(), PlatformError>;
}

/// Community server (role management).
#[async_trait]
pub trait CommunityPlatform: Send + Sync {
    fn is_loaded(&self) -> bool;

    async fn grant_role(&self, user: &str, role: &str) -> Result<(), PlatformError>;

    async fn revoke_role(&self, user: &str, role: &str) -> Result<(), PlatformError>;
}
