//! Time-bounded privilege grants.
//!
//! Every moderator or VIP grant appends a `YYYY-MM-DD HH:MM:SS|user` line to a log
//! dedicated to that privilege. Timestamps are UTC unless the log is configured
//! with [`TimestampZone::Local`], which reads logs written in server local time. Once per ready tick the [`ExpiryTracker`] scans
//! each log and revokes grants older than the duration configured on the first
//! reward entry for that privilege.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDateTime, TimeDelta, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::GrantLogConfig;
use crate::domain::{ActionKind, RewardTable};
use crate::error::PlatformError;
use crate::ports::{ChatPlatform, Clock};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Privileges whose grants expire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GrantKind {
    Moderator,
    Vip,
}

impl GrantKind {
    pub const ALL: [GrantKind; 2] = [GrantKind::Moderator, GrantKind::Vip];

    /// The reward action whose duration governs this privilege.
    pub fn grant_action(self) -> ActionKind {
        match self {
            GrantKind::Moderator => ActionKind::ModeratorGrant,
            GrantKind::Vip => ActionKind::VipGrant,
        }
    }

    async fn revoke(self, chat: &dyn ChatPlatform, user: &str) -> Result<(), PlatformError> {
        match self {
            GrantKind::Moderator => chat.remove_moderator(user).await,
            GrantKind::Vip => chat.remove_vip(user).await,
        }
    }
}

impl fmt::Display for GrantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrantKind::Moderator => f.write_str("moderator"),
            GrantKind::Vip => f.write_str("vip"),
        }
    }
}

/// Zone of the wall-clock timestamps in a grant log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampZone {
    #[default]
    Utc,
    Local,
}

impl TimestampZone {
    fn to_utc(self, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
        match self {
            TimestampZone::Utc => Some(naive.and_utc()),
            // 夏時間の重複は早い方を採用
            TimestampZone::Local => naive
                .and_local_timezone(Local)
                .earliest()
                .map(|at| at.with_timezone(&Utc)),
        }
    }

    fn format(self, at: DateTime<Utc>) -> String {
        match self {
            TimestampZone::Utc => at.format(TIMESTAMP_FORMAT).to_string(),
            TimestampZone::Local => at.with_timezone(&Local).format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

/// One parsed log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantEntry {
    pub granted_at: DateTime<Utc>,
    pub user: String,
}

impl GrantEntry {
    pub fn parse(line: &str, zone: TimestampZone) -> Option<Self> {
        let (timestamp, user) = line.trim().split_once('|')?;
        let user = user.trim();
        if user.is_empty() {
            return None;
        }
        let naive = NaiveDateTime::parse_from_str(timestamp.trim(), TIMESTAMP_FORMAT).ok()?;
        let granted_at = zone.to_utc(naive)?;
        Some(Self {
            granted_at,
            user: user.to_string(),
        })
    }

    pub fn render(&self, zone: TimestampZone) -> String {
        format!("{}|{}", zone.format(self.granted_at), self.user)
    }
}

/// Append-only grant log file.
///
/// Clones share one lock, so an append from the instant loop never interleaves
/// with the expiry tracker's read or rewrite of the same file.
#[derive(Debug, Clone)]
pub struct GrantLog {
    path: PathBuf,
    zone: TimestampZone,
    lock: Arc<Mutex<()>>,
}

impl GrantLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            zone: TimestampZone::Utc,
            lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn with_zone(mut self, zone: TimestampZone) -> Self {
        self.zone = zone;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn zone(&self) -> TimestampZone {
        self.zone
    }

    pub async fn append(&self, entry: &GrantEntry) -> io::Result<()> {
        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", entry.render(self.zone))
    }

    /// Non-blank lines, read under the log lock.
    pub async fn snapshot(&self) -> io::Result<Vec<String>> {
        let _guard = self.lock.lock().await;
        self.lines()
    }

    /// Replace the lines of an earlier [`snapshot`](Self::snapshot) with `retained`.
    ///
    /// Lines appended since the snapshot are kept after `retained`.
    pub async fn replace_snapshot(&self, snapshot: &[String], mut retained: Vec<String>) -> io::Result<()> {
        let _guard = self.lock.lock().await;
        let current = self.lines()?;
        let appended = match current.strip_prefix(snapshot) {
            Some(rest) => rest.to_vec(),
            // 外部で編集された場合: スナップショットに無い行だけ残す
            None => current.into_iter().filter(|line| !snapshot.contains(line)).collect(),
        };
        retained.extend(appended);
        self.rewrite(&retained)
    }

    /// Non-blank lines, as written. A missing file has no lines.
    pub fn lines(&self) -> io::Result<Vec<String>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err),
        }
    }

    fn rewrite(&self, lines: &[String]) -> io::Result<()> {
        let mut content = lines.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }
        fs::write(&self.path, content)
    }
}

/// The moderator and VIP logs.
#[derive(Debug, Clone)]
pub struct GrantLogs {
    pub moderators: GrantLog,
    pub vips: GrantLog,
}

impl GrantLogs {
    pub fn from_config(config: &GrantLogConfig) -> Self {
        Self {
            moderators: GrantLog::new(config.moderators.clone()).with_zone(config.timezone),
            vips: GrantLog::new(config.vips.clone()).with_zone(config.timezone),
        }
    }

    pub fn get(&self, kind: GrantKind) -> &GrantLog {
        match kind {
            GrantKind::Moderator => &self.moderators,
            GrantKind::Vip => &self.vips,
        }
    }
}

/// Revokes grants whose configured duration has elapsed.
pub struct ExpiryTracker {
    logs: GrantLogs,
    rewards: Arc<RewardTable>,
    chat: Arc<dyn ChatPlatform>,
    clock: Arc<dyn Clock>,
}

impl ExpiryTracker {
    pub fn new(
        logs: GrantLogs,
        rewards: Arc<RewardTable>,
        chat: Arc<dyn ChatPlatform>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            logs,
            rewards,
            chat,
            clock,
        }
    }

    /// Scan every log once. Returns the revoked users per privilege.
    pub async fn tick(&self) -> Vec<(GrantKind, String)> {
        let mut revoked = Vec::new();
        for kind in GrantKind::ALL {
            match self.expire(kind).await {
                Ok(users) => revoked.extend(users.into_iter().map(|user| (kind, user))),
                Err(err) => warn!(
                    kind = %kind,
                    path = %self.logs.get(kind).path().display(),
                    error = %err,
                    "grant log could not be processed"
                ),
            }
        }
        revoked
    }

    /// Scan one log.
    ///
    /// Expired entries are revoked and dropped; entries whose revoke call fails are
    /// kept for the next tick. Unparseable lines are dropped with a warning. The file
    /// is rewritten only when something was removed, keeping grants appended while
    /// the revoke calls were in flight.
    pub async fn expire(&self, kind: GrantKind) -> io::Result<Vec<String>> {
        // 同じ action の報酬が複数あっても最初の1件の duration だけを使う
        let Some(rule) = self.rewards.first_for(kind.grant_action()) else {
            return Ok(Vec::new());
        };
        let Some(duration_secs) = rule.duration else {
            debug!(kind = %kind, reward = %rule.name, "reward has no duration, grants never expire");
            return Ok(Vec::new());
        };
        let duration = seconds(duration_secs);

        let log = self.logs.get(kind);
        let snapshot = log.snapshot().await?;
        if snapshot.is_empty() {
            return Ok(Vec::new());
        }

        let now = self.clock.now();
        let mut retained = Vec::with_capacity(snapshot.len());
        let mut revoked = Vec::new();
        let mut changed = false;

        for line in &snapshot {
            let Some(entry) = GrantEntry::parse(line, log.zone()) else {
                warn!(kind = %kind, line = %line, "dropping malformed grant log line");
                changed = true;
                continue;
            };

            if now - entry.granted_at <= duration {
                retained.push(line.clone());
                continue;
            }

            match kind.revoke(self.chat.as_ref(), &entry.user).await {
                Ok(()) => {
                    info!(kind = %kind, user = %entry.user, "grant expired, privilege revoked");
                    revoked.push(entry.user);
                    changed = true;
                }
                Err(err) => {
                    warn!(kind = %kind, user = %entry.user, error = %err, "revoke failed, will retry");
                    retained.push(line.clone());
                }
            }
        }

        if changed {
            log.replace_snapshot(&snapshot, retained).await?;
        }
        Ok(revoked)
    }
}

/// Seconds as a `TimeDelta`, saturating instead of overflowing.
pub(crate) fn seconds(secs: u64) -> TimeDelta {
    i64::try_from(secs)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}
