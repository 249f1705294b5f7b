//! Recording fakes for the collaborator ports.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::PlatformError;
use crate::ports::{ChatPlatform, CommunityPlatform, CredentialKind, Notifier};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    AddModerator(String),
    RemoveModerator(String),
    AddVip(String),
    RemoveVip(String),
    Timeout { user: String, secs: u64 },
    ChatMessage(String),
    LiveStatus,
    RefreshCredential(CredentialKind),
    GrantRole { user: String, role: String },
    RevokeRole { user: String, role: String },
}

/// Implements both platform ports and records every call.
pub struct RecordingPlatform {
    calls: Mutex<Vec<PlatformCall>>,
    failing: Mutex<HashSet<&'static str>>,
    delays: Mutex<HashMap<&'static str, Duration>>,
    loaded: AtomicBool,
    live: AtomicBool,
}

impl RecordingPlatform {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            delays: Mutex::new(HashMap::new()),
            loaded: AtomicBool::new(true),
            live: AtomicBool::new(false),
        }
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Make every call to `operation` fail from now on.
    pub fn fail_on(&self, operation: &'static str) {
        self.failing.lock().unwrap().insert(operation);
    }

    /// Make every call to `operation` take `delay` before it is recorded.
    pub fn delay_on(&self, operation: &'static str, delay: Duration) {
        self.delays.lock().unwrap().insert(operation, delay);
    }

    pub fn set_loaded(&self, loaded: bool) {
        self.loaded.store(loaded, Ordering::SeqCst);
    }

    pub fn set_live(&self, live: bool) {
        self.live.store(live, Ordering::SeqCst);
    }

    async fn record(&self, operation: &'static str, call: PlatformCall) -> Result<(), PlatformError> {
        let delay = self.delays.lock().unwrap().get(operation).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.calls.lock().unwrap().push(call);
        if self.failing.lock().unwrap().contains(operation) {
            return Err(PlatformError::request(operation, "injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl ChatPlatform for RecordingPlatform {
    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    async fn add_moderator(&self, user: &str) -> Result<(), PlatformError> {
        self.record("add_moderator", PlatformCall::AddModerator(user.into())).await
    }

    async fn remove_moderator(&self, user: &str) -> Result<(), PlatformError> {
        self.record("remove_moderator", PlatformCall::RemoveModerator(user.into())).await
    }

    async fn add_vip(&self, user: &str) -> Result<(), PlatformError> {
        self.record("add_vip", PlatformCall::AddVip(user.into())).await
    }

    async fn remove_vip(&self, user: &str) -> Result<(), PlatformError> {
        self.record("remove_vip", PlatformCall::RemoveVip(user.into())).await
    }

    async fn timeout(&self, user: &str, duration: Duration, _reason: &str) -> Result<(), PlatformError> {
        self.record(
            "timeout",
            PlatformCall::Timeout {
                user: user.into(),
                secs: duration.as_secs(),
            },
        ).await
    }

    async fn send_chat_message(&self, message: &str) -> Result<(), PlatformError> {
        self.record("send_chat_message", PlatformCall::ChatMessage(message.into())).await
    }

    async fn live_status(&self) -> Result<bool, PlatformError> {
        self.record("live_status", PlatformCall::LiveStatus).await?;
        Ok(self.live.load(Ordering::SeqCst))
    }

    async fn refresh_credential(&self, kind: CredentialKind) -> Result<(), PlatformError> {
        self.record("refresh_credential", PlatformCall::RefreshCredential(kind)).await
    }
}

#[async_trait]
impl CommunityPlatform for RecordingPlatform {
    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    async fn grant_role(&self, user: &str, role: &str) -> Result<(), PlatformError> {
        self.record(
            "grant_role",
            PlatformCall::GrantRole {
                user: user.into(),
                role: role.into(),
            },
        ).await
    }

    async fn revoke_role(&self, user: &str, role: &str) -> Result<(), PlatformError> {
        self.record(
            "revoke_role",
            PlatformCall::RevokeRole {
                user: user.into(),
                role: role.into(),
            },
        ).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Notify(String),
    Log(String),
}

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }

    pub fn logs(&self) -> Vec<String> {
        self.notices()
            .into_iter()
            .filter_map(|notice| match notice {
                Notice::Log(message) => Some(message),
                Notice::Notify(_) => None,
            })
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &str) -> Result<(), PlatformError> {
        self.notices.lock().unwrap().push(Notice::Notify(message.into()));
        Ok(())
    }

    async fn log(&self, message: &str) -> Result<(), PlatformError> {
        self.notices.lock().unwrap().push(Notice::Log(message.into()));
        Ok(())
    }
}
