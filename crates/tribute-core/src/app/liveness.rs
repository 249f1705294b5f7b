//! Stream live/offline tracking.

use tracing::{info, warn};

use crate::ports::{ChatPlatform, Notifier};

/// A change in stream status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveTransition {
    WentLive,
    WentOffline,
}

/// Polls the live status once per tick and announces changes.
///
/// The first successful poll only seeds the state; nothing is announced for it.
#[derive(Debug)]
pub struct LivenessMonitor {
    channel: String,
    is_live: Option<bool>,
}

impl LivenessMonitor {
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            is_live: None,
        }
    }

    pub fn is_live(&self) -> Option<bool> {
        self.is_live
    }

    pub async fn check(&mut self, chat: &dyn ChatPlatform, notifier: &dyn Notifier) -> Option<LiveTransition> {
        let live = match chat.live_status().await {
            Ok(live) => live,
            Err(err) => {
                warn!(channel = %self.channel, error = %err, "live status unavailable");
                return None;
            }
        };

        let previous = self.is_live.replace(live);
        let Some(previous) = previous else {
            info!(channel = %self.channel, live, "initial stream status");
            return None;
        };
        if previous == live {
            return None;
        }

        // live -> notify (視聴者向け), offline -> log (運営向け)
        let (transition, sent) = if live {
            info!(channel = %self.channel, "stream went live");
            let message = format!("{} is live", self.channel);
            (LiveTransition::WentLive, notifier.notify(&message).await)
        } else {
            info!(channel = %self.channel, "stream went offline");
            let message = format!("{} went offline", self.channel);
            (LiveTransition::WentOffline, notifier.log(&message).await)
        };
        if let Err(err) = sent {
            warn!(error = %err, "live status announcement failed");
        }
        Some(transition)
    }
}
