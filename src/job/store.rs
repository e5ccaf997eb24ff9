//! In-memory job store. Owns every live [`PrintJob`] and its backing file.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::model::{FileAnalysis, JobStatus, OptionChange, PrintJob, StoredFile, Tariff};
use crate::error::PrintError;

/// Keyed collection of print jobs. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<String, PrintJob>>>,
    tariff: Tariff,
    default_copies: u8,
    max_copies: u8,
}

impl JobStore {
    pub fn new(tariff: Tariff, default_copies: u8, max_copies: u8) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            tariff,
            default_copies,
            max_copies,
        }
    }

    pub fn max_copies(&self) -> u8 {
        self.max_copies
    }

    /// Insert a new `Pending` job for an already validated file.
    pub async fn create_job(
        &self,
        owner: &str,
        conversation_id: &str,
        file: StoredFile,
        analysis: FileAnalysis,
        now: DateTime<Utc>,
    ) -> PrintJob {
        let job = PrintJob::new(
            owner.to_string(),
            conversation_id.to_string(),
            file,
            analysis,
            self.default_copies,
            &self.tariff,
            now,
        );
        info!(
            job_id = %job.id,
            owner,
            pages = job.pages,
            color = job.has_color,
            cost = job.estimated_cost,
            "job created"
        );
        self.jobs.write().await.insert(job.id.clone(), job.clone());
        job
    }

    pub async fn get(&self, job_id: &str) -> Option<PrintJob> {
        self.jobs.read().await.get(job_id).cloned()
    }

    #[cfg(test)]
    pub async fn contains(&self, job_id: &str) -> bool {
        self.jobs.read().await.contains_key(job_id)
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// All live jobs, oldest first.
    pub async fn list(&self) -> Vec<PrintJob> {
        let mut jobs: Vec<PrintJob> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by_key(|j| j.created_at);
        jobs
    }

    /// Apply one option change to a pending job and recompute its cost.
    ///
    /// A non-pending job is left untouched and yields `InvalidState`.
    pub async fn update_options(
        &self,
        job_id: &str,
        change: OptionChange,
    ) -> Result<PrintJob, PrintError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| PrintError::NotFound(format!("job {job_id}")))?;

        if job.status != JobStatus::Pending {
            return Err(PrintError::InvalidState {
                job_id: job_id.to_string(),
                status: job.status,
            });
        }

        match change {
            OptionChange::Copies(n) => {
                if n == 0 || n > self.max_copies {
                    return Err(PrintError::Validation(format!(
                        "copies must be between 1 and {}",
                        self.max_copies
                    )));
                }
                job.copies = n;
            }
            OptionChange::ToggleDuplex => job.options.duplex = !job.options.duplex,
            OptionChange::Paper(paper) => job.options.paper = paper,
            OptionChange::Quality(quality) => job.options.quality = quality,
        }
        job.recompute_cost(&self.tariff);
        debug!(job_id, ?change, cost = job.estimated_cost, "job options updated");
        Ok(job.clone())
    }

    /// `Pending → Printing`. Records the start time.
    pub async fn start(&self, job_id: &str, now: DateTime<Utc>) -> Result<PrintJob, PrintError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| PrintError::NotFound(format!("job {job_id}")))?;
        if job.status != JobStatus::Pending {
            return Err(PrintError::InvalidState {
                job_id: job_id.to_string(),
                status: job.status,
            });
        }
        job.status = JobStatus::Printing;
        job.started_at = Some(now);
        Ok(job.clone())
    }

    /// Count one print attempt against a printing job. Returns the new total.
    pub async fn record_attempt(&self, job_id: &str) -> Result<u32, PrintError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| PrintError::NotFound(format!("job {job_id}")))?;
        job.attempts += 1;
        Ok(job.attempts)
    }

    /// `Printing → Completed | Failed`. Terminal jobs never change again.
    pub async fn finish(
        &self,
        job_id: &str,
        status: JobStatus,
        failure: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<PrintJob, PrintError> {
        debug_assert!(status.is_terminal());
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(job_id)
            .ok_or_else(|| PrintError::NotFound(format!("job {job_id}")))?;
        if job.status != JobStatus::Printing {
            return Err(PrintError::InvalidState {
                job_id: job_id.to_string(),
                status: job.status,
            });
        }
        job.status = status;
        job.failure = failure;
        job.finished_at = Some(now);
        Ok(job.clone())
    }

    /// Delete a job and its backing file. Missing ids are not an error.
    pub async fn remove(&self, job_id: &str) -> bool {
        let removed = self.jobs.write().await.remove(job_id);
        match removed {
            Some(job) => {
                release_file(&job.file_path).await;
                debug!(job_id, "job removed");
                true
            }
            None => false,
        }
    }

    /// Remove jobs older than `max_age`: every terminal job, and pending jobs
    /// no session references any more. Returns the removed ids.
    pub async fn sweep_aged<F>(
        &self,
        now: DateTime<Utc>,
        max_age: Duration,
        is_referenced: F,
    ) -> Vec<String>
    where
        F: Fn(&str) -> bool,
    {
        let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
        let expired: Vec<PrintJob> = {
            let mut jobs = self.jobs.write().await;
            let ids: Vec<String> = jobs
                .values()
                .filter(|job| now - job.age_anchor() > max_age)
                .filter(|job| match job.status {
                    JobStatus::Completed | JobStatus::Failed => true,
                    JobStatus::Pending => !is_referenced(&job.id),
                    JobStatus::Printing => false,
                })
                .map(|job| job.id.clone())
                .collect();
            ids.iter().filter_map(|id| jobs.remove(id)).collect()
        };

        for job in &expired {
            release_file(&job.file_path).await;
        }
        expired.into_iter().map(|job| job.id).collect()
    }
}

async fn release_file(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to delete job file"),
    }
}
