use thiserror::Error;

use crate::job::JobStatus;

#[derive(Debug, Error)]
pub enum PrintError {
    /// Rejected before a job exists (format, size, unreadable file).
    #[error("Invalid file: {0}")]
    Validation(String),

    #[error("Too many requests, hourly limit reached")]
    RateLimited,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Job {job_id} is {status}, options can no longer change")]
    InvalidState { job_id: String, status: JobStatus },

    #[error("Printer is offline")]
    PrinterOffline,

    #[error("Print failed after {attempts} attempts")]
    PrintExecutionFailed { attempts: u32 },

    #[error("System error: {0}")]
    System(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl PrintError {
    /// True for the failures a conversation recovers from by telling the user.
    /// Anything else escalates to process shutdown.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, PrintError::Transport(_))
    }
}
