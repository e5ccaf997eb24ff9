use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tracks the lifecycle status of a print job.
///
/// Flow: PENDING → PRINTING → COMPLETED | FAILED. The last two are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Printing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Printing => write!(f, "printing"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Error returned by the strict option parsers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptionError(pub String);

impl fmt::Display for ParseOptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized option: {}", self.0)
    }
}

impl std::error::Error for ParseOptionError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PaperSize {
    #[default]
    A4,
    A3,
    Letter,
}

impl PaperSize {
    pub const ALL: [PaperSize; 3] = [PaperSize::A4, PaperSize::A3, PaperSize::Letter];

    /// CUPS `media` keyword.
    pub fn media(self) -> &'static str {
        match self {
            PaperSize::A4 => "A4",
            PaperSize::A3 => "A3",
            PaperSize::Letter => "Letter",
        }
    }
}

impl fmt::Display for PaperSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.media())
    }
}

impl FromStr for PaperSize {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A4" => Ok(PaperSize::A4),
            "A3" => Ok(PaperSize::A3),
            "LETTER" => Ok(PaperSize::Letter),
            other => Err(ParseOptionError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Quality {
    Draft,
    #[default]
    Normal,
    High,
}

impl Quality {
    pub const ALL: [Quality; 3] = [Quality::Draft, Quality::Normal, Quality::High];

    /// IPP `print-quality` enum value (3 = draft, 4 = normal, 5 = high).
    pub fn ipp_value(self) -> u8 {
        match self {
            Quality::Draft => 3,
            Quality::Normal => 4,
            Quality::High => 5,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quality::Draft => write!(f, "draft"),
            Quality::Normal => write!(f, "normal"),
            Quality::High => write!(f, "high"),
        }
    }
}

impl FromStr for Quality {
    type Err = ParseOptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DRAFT" => Ok(Quality::Draft),
            "NORMAL" => Ok(Quality::Normal),
            "HIGH" => Ok(Quality::High),
            other => Err(ParseOptionError(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PrintOptions {
    pub duplex: bool,
    pub paper: PaperSize,
    pub quality: Quality,
}

/// Per-page prices, in whole currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tariff {
    pub bw_rate: u64,
    pub color_rate: u64,
}

impl Tariff {
    /// `pages × copies × rate`, the rate picked by the color flag.
    pub fn cost(&self, pages: u32, copies: u8, has_color: bool) -> u64 {
        let rate = if has_color { self.color_rate } else { self.bw_rate };
        u64::from(pages) * u64::from(copies) * rate
    }
}

impl Default for Tariff {
    fn default() -> Self {
        Self {
            bw_rate: 500,
            color_rate: 1000,
        }
    }
}

/// A file that passed validation and was copied into the upload directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub file_name: String,
    pub path: PathBuf,
    pub extension: String,
    pub size_bytes: u64,
}

/// Facts the file inspector reports about a stored file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAnalysis {
    pub pages: u32,
    pub has_color: bool,
}

/// A single mutation of a pending job's settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionChange {
    Copies(u8),
    ToggleDuplex,
    Paper(PaperSize),
    Quality(Quality),
}

/// One submitted document awaiting or undergoing printing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintJob {
    pub id: String,
    pub file_name: String,
    pub file_path: PathBuf,
    pub extension: String,
    pub size_bytes: u64,
    pub pages: u32,
    pub has_color: bool,
    pub copies: u8,
    pub options: PrintOptions,
    pub estimated_cost: u64,
    pub owner: String,
    pub conversation_id: String,
    pub status: JobStatus,
    pub attempts: u32,
    pub failure: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PrintJob {
    pub fn new(
        owner: String,
        conversation_id: String,
        file: StoredFile,
        analysis: FileAnalysis,
        copies: u8,
        tariff: &Tariff,
        now: DateTime<Utc>,
    ) -> Self {
        let pages = analysis.pages.max(1);
        Self {
            id: Uuid::new_v4().to_string(),
            file_name: file.file_name,
            file_path: file.path,
            extension: file.extension,
            size_bytes: file.size_bytes,
            pages,
            has_color: analysis.has_color,
            copies,
            options: PrintOptions::default(),
            estimated_cost: tariff.cost(pages, copies, analysis.has_color),
            owner,
            conversation_id,
            status: JobStatus::Pending,
            attempts: 0,
            failure: None,
            created_at: now,
            started_at: None,
            finished_at: None,
        }
    }

    pub fn recompute_cost(&mut self, tariff: &Tariff) {
        self.estimated_cost = tariff.cost(self.pages, self.copies, self.has_color);
    }

    /// Sheets of output, before duplexing.
    pub fn total_pages(&self) -> u64 {
        u64::from(self.pages) * u64::from(self.copies)
    }

    /// Short id shown to users.
    pub fn short_id(&self) -> &str {
        &self.id[..8.min(self.id.len())]
    }

    /// Reference time for age-based reclamation.
    pub fn age_anchor(&self) -> DateTime<Utc> {
        self.finished_at.unwrap_or(self.created_at)
    }
}

/// Immutable snapshot of a job that reached a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub job_id: String,
    pub owner: String,
    pub file_name: String,
    pub pages: u32,
    pub copies: u8,
    pub has_color: bool,
    pub options: PrintOptions,
    pub cost: u64,
    pub status: JobStatus,
    pub attempts: u32,
    pub failure: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: i64,
}

impl HistoryEntry {
    /// Snapshot a terminal job. `finished_at` falls back to `now` if unset.
    pub fn from_job(job: &PrintJob, now: DateTime<Utc>) -> Self {
        let finished_at = job.finished_at.unwrap_or(now);
        let started = job.started_at.unwrap_or(job.created_at);
        Self {
            job_id: job.id.clone(),
            owner: job.owner.clone(),
            file_name: job.file_name.clone(),
            pages: job.pages,
            copies: job.copies,
            has_color: job.has_color,
            options: job.options,
            cost: job.estimated_cost,
            status: job.status,
            attempts: job.attempts,
            failure: job.failure.clone(),
            created_at: job.created_at,
            started_at: job.started_at,
            finished_at,
            duration_ms: (finished_at - started).num_milliseconds(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored() -> StoredFile {
        StoredFile {
            file_name: "skripsi.pdf".into(),
            path: PathBuf::from("/tmp/skripsi.pdf"),
            extension: "pdf".into(),
            size_bytes: 2048,
        }
    }

    #[test]
    fn job_creation_defaults() {
        let now = Utc::now();
        let job = PrintJob::new(
            "628111".into(),
            "chat-1".into(),
            stored(),
            FileAnalysis {
                pages: 3,
                has_color: false,
            },
            1,
            &Tariff::default(),
            now,
        );
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.copies, 1);
        assert_eq!(job.estimated_cost, 1500);
        assert_eq!(job.options, PrintOptions::default());
        assert_eq!(job.options.paper, PaperSize::A4);
        assert_eq!(job.options.quality, Quality::Normal);
        assert!(job.started_at.is_none());
        assert_eq!(job.short_id().len(), 8);
    }

    #[test]
    fn zero_pages_is_clamped_to_one() {
        let job = PrintJob::new(
            "a".into(),
            "c".into(),
            stored(),
            FileAnalysis {
                pages: 0,
                has_color: true,
            },
            2,
            &Tariff::default(),
            Utc::now(),
        );
        assert_eq!(job.pages, 1);
        assert_eq!(job.estimated_cost, 2000);
    }

    #[test]
    fn tariff_uses_color_rate() {
        let tariff = Tariff {
            bw_rate: 300,
            color_rate: 1500,
        };
        assert_eq!(tariff.cost(4, 2, false), 2400);
        assert_eq!(tariff.cost(4, 2, true), 12000);
    }

    #[test]
    fn strict_option_parsers() {
        assert_eq!("a3".parse::<PaperSize>(), Ok(PaperSize::A3));
        assert_eq!(" Letter ".parse::<PaperSize>(), Ok(PaperSize::Letter));
        assert!("B5".parse::<PaperSize>().is_err());
        assert_eq!("HIGH".parse::<Quality>(), Ok(Quality::High));
        assert_eq!("draft".parse::<Quality>(), Ok(Quality::Draft));
        assert!("ultra".parse::<Quality>().is_err());
    }

    #[test]
    fn history_entry_from_terminal_job() {
        let now = Utc::now();
        let mut job = PrintJob::new(
            "a".into(),
            "c".into(),
            stored(),
            FileAnalysis {
                pages: 2,
                has_color: false,
            },
            1,
            &Tariff::default(),
            now,
        );
        job.status = JobStatus::Completed;
        job.attempts = 2;
        job.started_at = Some(now);
        job.finished_at = Some(now + chrono::Duration::seconds(4));

        let entry = HistoryEntry::from_job(&job, now);
        assert_eq!(entry.job_id, job.id);
        assert_eq!(entry.status, JobStatus::Completed);
        assert_eq!(entry.attempts, 2);
        assert_eq!(entry.duration_ms, 4000);
    }

    #[test]
    fn status_terminality() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Printing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert_eq!(JobStatus::Printing.to_string(), "printing");
    }
}
