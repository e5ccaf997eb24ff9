use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::error::PrintError;
use crate::job::{JobStatus, JobStore, PrintJob};
use crate::printer::{PrintRequest, PrinterService};
use crate::stats::StatsRecorder;

/// Configuration for retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Print attempts before the job is marked as failed.
    pub max_attempts: u32,
    /// Fixed wait between two attempts.
    pub retry_delay: Duration,
    /// Hard bound on one attempt; expiry counts as a failed attempt.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(2),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

/// A job that reached `Completed`.
#[derive(Debug, Clone)]
pub struct PrintReport {
    pub job: PrintJob,
    pub attempts: u32,
}

/// Drives submitted jobs to a terminal state against the printer.
pub struct ExecutionEngine<P> {
    printer: Arc<P>,
    jobs: JobStore,
    stats: StatsRecorder,
    policy: RetryPolicy,
    /// Grace window a finished job stays visible in the job store.
    cleanup_delay: Duration,
    clock: Clock,
}

impl<P> Clone for ExecutionEngine<P> {
    fn clone(&self) -> Self {
        Self {
            printer: Arc::clone(&self.printer),
            jobs: self.jobs.clone(),
            stats: self.stats.clone(),
            policy: self.policy,
            cleanup_delay: self.cleanup_delay,
            clock: self.clock,
        }
    }
}

impl<P: PrinterService> ExecutionEngine<P> {
    pub fn new(
        printer: Arc<P>,
        jobs: JobStore,
        stats: StatsRecorder,
        policy: RetryPolicy,
        cleanup_delay: Duration,
        clock: Clock,
    ) -> Self {
        Self {
            printer,
            jobs,
            stats,
            policy,
            cleanup_delay,
            clock,
        }
    }

    /// Run a pending job to a terminal state.
    ///
    /// - The job moves to `Printing` first; a missing or non-pending job is
    ///   returned as an error without touching it.
    /// - An offline printer fails the job with zero attempts, no retry.
    /// - Otherwise up to `max_attempts` prints, `retry_delay` apart; the first
    ///   success wins.
    ///
    /// Whatever the outcome, the job is recorded in the history and scheduled
    /// for removal after the cleanup delay.
    pub async fn submit(&self, job_id: &str) -> Result<PrintReport, PrintError> {
        let job = self.jobs.start(job_id, self.clock.now()).await?;
        info!(job_id, owner = %job.owner, copies = job.copies, "print job started");

        let outcome = self.drive(&job).await;
        let (status, failure) = match &outcome {
            Ok(_) => (JobStatus::Completed, None),
            Err(e) => (JobStatus::Failed, Some(e.to_string())),
        };

        let now = self.clock.now();
        let finished = self.jobs.finish(job_id, status, failure, now).await;
        self.schedule_removal(job_id);

        let job = match finished {
            Ok(job) => job,
            Err(e) => {
                error!(job_id, error = %e, "job disappeared before it could finish");
                return Err(PrintError::System(format!(
                    "job {job_id} disappeared during execution"
                )));
            }
        };
        self.stats.record_outcome(&job, now).await;

        match outcome {
            Ok(attempts) => {
                info!(job_id, attempts, pages = job.total_pages(), "print job completed");
                Ok(PrintReport { job, attempts })
            }
            Err(e) => {
                warn!(job_id, attempts = job.attempts, error = %e, "print job failed");
                Err(e)
            }
        }
    }

    /// Health gate and attempt loop. Returns the number of attempts used.
    async fn drive(&self, job: &PrintJob) -> Result<u32, PrintError> {
        if !self.health_check().await? {
            warn!(job_id = %job.id, "printer offline, job will not be retried");
            return Err(PrintError::PrinterOffline);
        }

        let request = PrintRequest::from(job);
        let max = self.policy.max_attempts;
        for attempt in 1..=max {
            self.jobs
                .record_attempt(&job.id)
                .await
                .map_err(|e| PrintError::System(e.to_string()))?;

            if self.attempt(&request).await? {
                return Ok(attempt);
            }

            if attempt < max {
                log_retry(&job.id, attempt, max, self.policy.retry_delay);
                sleep(self.policy.retry_delay).await;
            }
        }
        Err(PrintError::PrintExecutionFailed { attempts: max })
    }

    /// Health-checked single print outside the job lifecycle (test pages).
    pub async fn print_once(&self, request: &PrintRequest) -> Result<(), PrintError> {
        if !self.health_check().await? {
            return Err(PrintError::PrinterOffline);
        }
        if self.attempt(request).await? {
            Ok(())
        } else {
            Err(PrintError::PrintExecutionFailed { attempts: 1 })
        }
    }

    /// Health check for status commands. A crashed check reads as offline.
    pub async fn is_online(&self) -> bool {
        match self.health_check().await {
            Ok(online) => online,
            Err(e) => {
                warn!(error = %e, "printer health check crashed");
                false
            }
        }
    }

    /// `check_online` on its own task, bounded by the attempt timeout. A
    /// timeout reads as offline; a panic comes back as `System`.
    async fn health_check(&self) -> Result<bool, PrintError> {
        let printer = Arc::clone(&self.printer);
        let limit = self.policy.attempt_timeout;
        let handle = tokio::spawn(async move { timeout(limit, printer.check_online()).await });

        match handle.await {
            Ok(result) => Ok(result.unwrap_or(false)),
            Err(e) => Err(PrintError::System(format!("printer health check aborted: {e}"))),
        }
    }

    /// One print attempt on its own task, so a panicking driver surfaces as a
    /// `System` error instead of tearing down the engine.
    async fn attempt(&self, request: &PrintRequest) -> Result<bool, PrintError> {
        let printer = Arc::clone(&self.printer);
        let request = request.clone();
        let limit = self.policy.attempt_timeout;
        let handle = tokio::spawn(async move { timeout(limit, printer.print(&request)).await });

        match handle.await {
            Ok(Ok(ok)) => Ok(ok),
            Ok(Err(_)) => {
                warn!(timeout_secs = limit.as_secs(), "print attempt timed out");
                Ok(false)
            }
            Err(e) => Err(PrintError::System(format!("print attempt aborted: {e}"))),
        }
    }

    fn schedule_removal(&self, job_id: &str) {
        let jobs = self.jobs.clone();
        let job_id = job_id.to_string();
        let delay = self.cleanup_delay;
        tokio::spawn(async move {
            sleep(delay).await;
            if jobs.remove(&job_id).await {
                debug!(job_id, "finished job removed after grace window");
            }
        });
    }
}

fn log_retry(job_id: &str, attempt: u32, max: u32, delay: Duration) {
    warn!(
        job_id,
        attempt,
        max,
        delay_ms = delay.as_millis() as u64,
        "print attempt failed, retrying"
    );
}
