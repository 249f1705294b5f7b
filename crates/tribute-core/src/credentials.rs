//! Periodic OAuth refresh.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{error, info};

use crate::config::CredentialConfig;
use crate::grants::seconds;
use crate::ports::{ChatPlatform, Clock, CredentialKind};

/// Refreshes the viewer and bot credentials once per interval.
///
/// The timer starts at construction, so the first refresh happens one full
/// interval after startup.
pub struct CredentialRefresher {
    interval: TimeDelta,
    last_refreshed: DateTime<Utc>,
    clock: Arc<dyn Clock>,
}

impl CredentialRefresher {
    pub fn new(config: &CredentialConfig, clock: Arc<dyn Clock>) -> Self {
        let last_refreshed = clock.now();
        Self {
            interval: seconds(config.refresh_interval_secs),
            last_refreshed,
            clock,
        }
    }

    pub fn is_due(&self) -> bool {
        self.clock.now() - self.last_refreshed >= self.interval
    }

    /// Refresh both credentials if the interval elapsed. Returns whether a refresh
    /// round ran.
    ///
    /// The timer is reset even when a refresh fails, so a broken token endpoint is
    /// retried once per interval rather than on every tick.
    pub async fn tick(&mut self, chat: &dyn ChatPlatform) -> bool {
        if !self.is_due() {
            return false;
        }

        for kind in CredentialKind::ALL {
            match chat.refresh_credential(kind).await {
                Ok(()) => info!(credential = %kind, "credential refreshed"),
                Err(err) => error!(credential = %kind, error = %err, "credential refresh failed"),
            }
        }
        self.last_refreshed = self.clock.now();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FixedClock;
    use crate::testing::{PlatformCall, RecordingPlatform};

    fn refresher(clock: &FixedClock) -> CredentialRefresher {
        CredentialRefresher::new(
            &CredentialConfig {
                refresh_interval_secs: 3 * 60 * 60,
            },
            Arc::new(clock.clone()),
        )
    }

    #[tokio::test]
    async fn refreshes_viewer_then_bot_after_interval() {
        let clock = FixedClock::new(DateTime::<Utc>::UNIX_EPOCH);
        let chat = RecordingPlatform::new();
        let mut refresher = refresher(&clock);

        assert!(!refresher.tick(&chat).await);

        clock.advance(TimeDelta::hours(3));
        assert!(refresher.tick(&chat).await);
        assert_eq!(
            chat.calls(),
            vec![
                PlatformCall::RefreshCredential(CredentialKind::Viewer),
                PlatformCall::RefreshCredential(CredentialKind::Bot),
            ]
        );

        // タイマーはリセットされる
        assert!(!refresher.tick(&chat).await);
    }

    #[tokio::test]
    async fn failures_still_reset_the_timer() {
        let clock = FixedClock::new(DateTime::<Utc>::UNIX_EPOCH);
        let chat = RecordingPlatform::new();
        chat.fail_on("refresh_credential");
        let mut refresher = refresher(&clock);

        clock.advance(TimeDelta::hours(4));
        assert!(refresher.tick(&chat).await);
        assert_eq!(chat.calls().len(), 2);
        assert!(!refresher.is_due());
    }
}
