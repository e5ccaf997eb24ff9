//! Per-user statistics and the bounded print history.
//!
//! The [`StatsRecorder`] is fed by the desk (every admitted message) and by
//! the execution engine (every terminal job). It is a side channel: nothing
//! in the job lifecycle waits on it, and a failed flush only logs.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::PrintError;
use crate::job::{HistoryEntry, JobStatus, PrintJob};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStat {
    pub total_requests: u64,
    pub total_prints: u64,
    pub total_pages: u64,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    #[serde(default)]
    pub last_conversation: String,
}

impl UserStat {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            total_requests: 0,
            total_prints: 0,
            total_pages: 0,
            first_seen: now,
            last_seen: now,
            last_conversation: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub jobs_completed: u64,
    pub jobs_failed: u64,
    pub pages_printed: u64,
    pub revenue: u64,
}

/// Desk-wide numbers for the admin `/stats` command and `printdesk status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub users: usize,
    pub total_requests: u64,
    pub totals: Totals,
    pub history_len: usize,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    users: HashMap<String, UserStat>,
    /// Most recent first.
    history: Vec<HistoryEntry>,
    totals: Totals,
}

#[derive(Default)]
struct StatsState {
    users: HashMap<String, UserStat>,
    history: VecDeque<HistoryEntry>,
    totals: Totals,
    dirty: bool,
}

#[derive(Clone)]
pub struct StatsRecorder {
    state: Arc<RwLock<StatsState>>,
    path: Option<PathBuf>,
    live_cap: usize,
    persist_cap: usize,
}

impl StatsRecorder {
    /// A recorder that never touches disk.
    pub fn in_memory(live_cap: usize, persist_cap: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(StatsState::default())),
            path: None,
            live_cap,
            persist_cap: persist_cap.max(live_cap),
        }
    }

    /// Restore from the snapshot at `path` if it exists; flushes go there.
    pub async fn load(path: &Path, live_cap: usize, persist_cap: usize) -> Result<Self, PrintError> {
        let mut recorder = Self::in_memory(live_cap, persist_cap);
        recorder.path = Some(path.to_path_buf());

        match tokio::fs::read(path).await {
            Ok(bytes) => {
                let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
                let mut state = recorder.state.write().await;
                state.users = snapshot.users;
                state.history = snapshot
                    .history
                    .into_iter()
                    .take(recorder.persist_cap)
                    .collect();
                state.totals = snapshot.totals;
                info!(
                    path = %path.display(),
                    users = state.users.len(),
                    history = state.history.len(),
                    "stats snapshot loaded"
                );
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no stats snapshot yet");
            }
            Err(e) => return Err(e.into()),
        }
        Ok(recorder)
    }

    /// Count one admitted message from `sender`.
    pub async fn record_request(&self, sender: &str, conversation_id: &str, now: DateTime<Utc>) {
        let mut state = self.state.write().await;
        let stat = state
            .users
            .entry(sender.to_string())
            .or_insert_with(|| UserStat::new(now));
        stat.total_requests += 1;
        stat.last_seen = now;
        stat.last_conversation = conversation_id.to_string();
        state.dirty = true;
    }

    /// Append a terminal job to the history and fold it into the totals.
    pub async fn record_outcome(&self, job: &PrintJob, now: DateTime<Utc>) {
        let entry = HistoryEntry::from_job(job, now);
        let mut state = self.state.write().await;

        match job.status {
            JobStatus::Completed => {
                state.totals.jobs_completed += 1;
                state.totals.pages_printed += job.total_pages();
                state.totals.revenue += job.estimated_cost;
                let stat = state
                    .users
                    .entry(job.owner.clone())
                    .or_insert_with(|| UserStat::new(now));
                stat.total_prints += 1;
                stat.total_pages += job.total_pages();
            }
            JobStatus::Failed => state.totals.jobs_failed += 1,
            JobStatus::Pending | JobStatus::Printing => return,
        }

        state.history.push_front(entry);
        state.history.truncate(self.persist_cap);
        state.dirty = true;
    }

    /// Most recent history entries, at most the live cap.
    pub async fn recent(&self, limit: usize) -> Vec<HistoryEntry> {
        let state = self.state.read().await;
        state
            .history
            .iter()
            .take(limit.min(self.live_cap))
            .cloned()
            .collect()
    }

    pub async fn user(&self, sender: &str) -> Option<UserStat> {
        self.state.read().await.users.get(sender).cloned()
    }

    /// Top senders by pages printed, then by prints.
    pub async fn leaderboard(&self, limit: usize) -> Vec<(String, UserStat)> {
        let state = self.state.read().await;
        let mut users: Vec<(String, UserStat)> = state
            .users
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        users.sort_by(|a, b| {
            b.1.total_pages
                .cmp(&a.1.total_pages)
                .then(b.1.total_prints.cmp(&a.1.total_prints))
                .then(a.0.cmp(&b.0))
        });
        users.truncate(limit);
        users
    }

    pub async fn summary(&self) -> Summary {
        let state = self.state.read().await;
        Summary {
            users: state.users.len(),
            total_requests: state.users.values().map(|u| u.total_requests).sum(),
            totals: state.totals.clone(),
            history_len: state.history.len(),
        }
    }

    /// `(sender, last conversation)` for everyone seen within `window`.
    pub async fn recently_active(&self, now: DateTime<Utc>, window: Duration) -> Vec<(String, String)> {
        let state = self.state.read().await;
        let mut active: Vec<(String, String)> = state
            .users
            .iter()
            .filter(|(_, u)| now - u.last_seen <= window && !u.last_conversation.is_empty())
            .map(|(k, u)| (k.clone(), u.last_conversation.clone()))
            .collect();
        active.sort();
        active
    }

    /// Write the snapshot if anything changed since the last flush.
    /// Returns whether a write happened.
    pub async fn flush(&self) -> Result<bool, PrintError> {
        let Some(path) = &self.path else {
            return Ok(false);
        };

        let json = {
            let mut state = self.state.write().await;
            if !state.dirty {
                return Ok(false);
            }
            let snapshot = Snapshot {
                users: state.users.clone(),
                history: state.history.iter().cloned().collect(),
                totals: state.totals.clone(),
            };
            state.dirty = false;
            serde_json::to_vec_pretty(&snapshot)?
        };

        if let Err(e) = write_snapshot(path, &json).await {
            // Keep the changes pending so the next flush retries them.
            self.state.write().await.dirty = true;
            return Err(e.into());
        }
        debug!(path = %path.display(), bytes = json.len(), "stats flushed");
        Ok(true)
    }
}

/// Temp file plus rename, so readers never see a torn snapshot.
async fn write_snapshot(path: &Path, json: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, json).await?;
    tokio::fs::rename(&tmp, path).await
}
