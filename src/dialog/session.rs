use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use super::state::Step;

/// Per-conversation cursor over a job's configuration dialog.
///
/// `job_id` does not own the job. A session whose job has disappeared from
/// the job store is stale and gets dropped by whoever notices first.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSession {
    pub conversation_id: String,
    pub job_id: String,
    pub step: Step,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

/// In-memory session store keyed by conversation id.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, ConversationSession>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a session at `ConfirmPrint`. Returns the session it replaced.
    pub async fn start(
        &self,
        conversation_id: &str,
        job_id: &str,
        now: DateTime<Utc>,
    ) -> Option<ConversationSession> {
        let session = ConversationSession {
            conversation_id: conversation_id.to_string(),
            job_id: job_id.to_string(),
            step: Step::ConfirmPrint,
            started_at: now,
            last_activity: now,
        };
        self.sessions
            .write()
            .await
            .insert(conversation_id.to_string(), session)
    }

    pub async fn get(&self, conversation_id: &str) -> Option<ConversationSession> {
        self.sessions.read().await.get(conversation_id).cloned()
    }

    /// Move to `step` and refresh the activity timestamp.
    pub async fn advance(&self, conversation_id: &str, step: Step, now: DateTime<Utc>) -> bool {
        match self.sessions.write().await.get_mut(conversation_id) {
            Some(session) => {
                session.step = step;
                session.last_activity = now;
                true
            }
            None => false,
        }
    }

    pub async fn remove(&self, conversation_id: &str) -> Option<ConversationSession> {
        self.sessions.write().await.remove(conversation_id)
    }

    /// Job ids referenced by live sessions.
    pub async fn job_ids(&self) -> Vec<String> {
        self.sessions
            .read()
            .await
            .values()
            .map(|s| s.job_id.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Delete sessions idle for longer than `timeout`. Returns the removed ones.
    pub async fn sweep_idle(
        &self,
        now: DateTime<Utc>,
        timeout: Duration,
    ) -> Vec<ConversationSession> {
        let timeout = chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::MAX);
        let mut sessions = self.sessions.write().await;
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, s)| now - s.last_activity > timeout)
            .map(|(k, _)| k.clone())
            .collect();
        expired
            .iter()
            .filter_map(|k| sessions.remove(k))
            .collect()
    }
}
