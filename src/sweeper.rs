//! Periodic reclamation of idle sessions and aged jobs.
//!
//! The execution engine already schedules removal of every job it finishes;
//! the sweeper is the backstop for jobs that never reached it (abandoned
//! before confirmation) and for the sessions that pointed at them.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::dialog::SessionStore;
use crate::job::JobStore;
use crate::rate_limit::RateLimiter;

#[derive(Debug, Clone, Copy)]
pub struct SweepSettings {
    pub session_timeout: Duration,
    pub session_interval: Duration,
    pub job_max_age: Duration,
    pub job_interval: Duration,
}

impl Default for SweepSettings {
    fn default() -> Self {
        Self {
            session_timeout: Duration::from_secs(15 * 60),
            session_interval: Duration::from_secs(5 * 60),
            job_max_age: Duration::from_secs(60 * 60),
            job_interval: Duration::from_secs(30 * 60),
        }
    }
}

#[derive(Clone)]
pub struct Sweeper {
    sessions: SessionStore,
    jobs: JobStore,
    limiter: Arc<RateLimiter>,
    settings: SweepSettings,
    clock: Clock,
}

impl Sweeper {
    pub fn new(
        sessions: SessionStore,
        jobs: JobStore,
        limiter: Arc<RateLimiter>,
        settings: SweepSettings,
        clock: Clock,
    ) -> Self {
        Self {
            sessions,
            jobs,
            limiter,
            settings,
            clock,
        }
    }

    /// Drop sessions idle longer than the timeout. Their jobs are left alone.
    pub async fn sweep_sessions(&self) -> usize {
        let now = self.clock.now();
        let removed = self
            .sessions
            .sweep_idle(now, self.settings.session_timeout)
            .await;
        let windows = self.limiter.forget_idle(now);
        if !removed.is_empty() {
            info!(removed = removed.len(), "expired idle sessions");
        }
        debug!(windows, "rate windows released");
        removed.len()
    }

    /// Drop terminal jobs (and unreferenced pending ones) past the max age.
    pub async fn sweep_jobs(&self) -> usize {
        let referenced: HashSet<String> = self.sessions.job_ids().await.into_iter().collect();
        let removed = self
            .jobs
            .sweep_aged(self.clock.now(), self.settings.job_max_age, |id| {
                referenced.contains(id)
            })
            .await;
        if !removed.is_empty() {
            info!(removed = removed.len(), "reclaimed aged jobs");
        }
        removed.len()
    }

    /// Start both sweeps on their own intervals until `cancel` fires.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut session_tick = tokio::time::interval(self.settings.session_interval);
            let mut job_tick = tokio::time::interval(self.settings.job_interval);
            // Skip the immediate first ticks.
            session_tick.tick().await;
            job_tick.tick().await;

            loop {
                tokio::select! {
                    _ = session_tick.tick() => {
                        self.sweep_sessions().await;
                    }
                    _ = job_tick.tick() => {
                        self.sweep_jobs().await;
                    }
                    _ = cancel.cancelled() => {
                        debug!("sweeper shutting down");
                        break;
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{FileAnalysis, JobStatus, StoredFile, Tariff};
    use std::path::PathBuf;

    struct Fixture {
        sweeper: Sweeper,
        sessions: SessionStore,
        jobs: JobStore,
        clock: Clock,
        _dir: tempfile::TempDir,
        file: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("job.pdf");
        std::fs::write(&file, b"%PDF").unwrap();
        let sessions = SessionStore::new();
        let jobs = JobStore::new(Tariff::default(), 1, 10);
        let clock = Clock::follow_tokio();
        let sweeper = Sweeper::new(
            sessions.clone(),
            jobs.clone(),
            Arc::new(RateLimiter::new(10, Vec::new())),
            SweepSettings::default(),
            clock,
        );
        Fixture {
            sweeper,
            sessions,
            jobs,
            clock,
            _dir: dir,
            file,
        }
    }

    async fn create(f: &Fixture) -> String {
        f.jobs
            .create_job(
                "628111",
                "chat-1",
                StoredFile {
                    file_name: "job.pdf".into(),
                    path: f.file.clone(),
                    extension: "pdf".into(),
                    size_bytes: 4,
                },
                FileAnalysis {
                    pages: 1,
                    has_color: false,
                },
                f.clock.now(),
            )
            .await
            .id
    }

    #[tokio::test(start_paused = true)]
    async fn idle_session_is_swept_and_job_kept() {
        let f = fixture();
        let job_id = create(&f).await;
        f.sessions.start("chat-1", &job_id, f.clock.now()).await;

        tokio::time::advance(Duration::from_secs(14 * 60)).await;
        assert_eq!(f.sweeper.sweep_sessions().await, 0);

        tokio::time::advance(Duration::from_secs(2 * 60)).await;
        assert_eq!(f.sweeper.sweep_sessions().await, 1);
        assert!(f.sessions.get("chat-1").await.is_none());

        let job = f.jobs.get(&job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn aged_terminal_job_is_swept_with_its_file() {
        let f = fixture();
        let job_id = create(&f).await;
        f.jobs.start(&job_id, f.clock.now()).await.unwrap();
        f.jobs
            .finish(&job_id, JobStatus::Failed, Some("offline".into()), f.clock.now())
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(59 * 60)).await;
        assert_eq!(f.sweeper.sweep_jobs().await, 0);

        tokio::time::advance(Duration::from_secs(2 * 60)).await;
        assert_eq!(f.sweeper.sweep_jobs().await, 1);
        assert!(!f.jobs.contains(&job_id).await);
        assert!(!f.file.exists());
    }

    #[tokio::test(start_paused = true)]
    async fn pending_job_with_live_session_survives_job_sweep() {
        let f = fixture();
        let job_id = create(&f).await;

        tokio::time::advance(Duration::from_secs(61 * 60)).await;
        f.sessions.start("chat-1", &job_id, f.clock.now()).await;
        assert_eq!(f.sweeper.sweep_jobs().await, 0);

        f.sessions.remove("chat-1").await;
        assert_eq!(f.sweeper.sweep_jobs().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn background_task_sweeps_and_stops() {
        let f = fixture();
        let job_id = create(&f).await;
        f.sessions.start("chat-1", &job_id, f.clock.now()).await;

        let cancel = CancellationToken::new();
        let handle = f.sweeper.clone().spawn(cancel.clone());

        // Idle timeout passes at 15 min; the sweep at 20 min catches it.
        tokio::time::sleep(Duration::from_secs(21 * 60)).await;
        assert!(f.sessions.get("chat-1").await.is_none());

        // The orphaned pending job goes at the 90 min job sweep.
        tokio::time::sleep(Duration::from_secs(70 * 60)).await;
        assert!(!f.jobs.contains(&job_id).await);

        cancel.cancel();
        handle.await.unwrap();
    }
}
