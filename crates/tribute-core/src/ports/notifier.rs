//! Notifier port - 告知・ログ送信先

use async_trait::async_trait;

use crate::error::PlatformError;

/// Announcement sink.
///
/// `notify` reaches the audience (e.g. a public announcement channel); `log` reaches
/// operators (e.g. a private moderation log channel).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str) -> Result<(), PlatformError>;

    async fn log(&self, message: &str) -> Result<(), PlatformError>;
}
