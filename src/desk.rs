//! The conversation boundary: turns inbound chat messages into job
//! lifecycle operations and every recoverable failure into a reply.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::DeskConfig;
use crate::dialog::{Dialog, Effect, SessionStore, prompt};
use crate::error::PrintError;
use crate::executor::ExecutionEngine;
use crate::inspector::FileInspector;
use crate::job::{JobStatus, JobStore, OptionChange, PrintJob, PrintOptions, StoredFile};
use crate::printer::{PrintRequest, PrinterService};
use crate::rate_limit::RateLimiter;
use crate::stats::StatsRecorder;
use crate::sweeper::{SweepSettings, Sweeper};
use crate::transport::{Attachment, ChatTransport, InboundMessage};

const LEADERBOARD_SIZE: usize = 10;
const QUEUE_HISTORY_SIZE: usize = 5;

pub struct PrintDesk<T, P, I> {
    config: DeskConfig,
    transport: Arc<T>,
    inspector: I,
    engine: ExecutionEngine<P>,
    jobs: JobStore,
    sessions: SessionStore,
    limiter: Arc<RateLimiter>,
    stats: StatsRecorder,
    clock: Clock,
    prints: TaskTracker,
}

impl<T, P, I> PrintDesk<T, P, I>
where
    T: ChatTransport,
    P: PrinterService,
    I: FileInspector,
{
    pub fn new(
        config: DeskConfig,
        transport: Arc<T>,
        printer: Arc<P>,
        inspector: I,
        stats: StatsRecorder,
        clock: Clock,
    ) -> Self {
        let jobs = JobStore::new(config.tariff(), config.default_copies, config.max_copies);
        let engine = ExecutionEngine::new(
            printer,
            jobs.clone(),
            stats.clone(),
            config.retry_policy(),
            config.cleanup_delay(),
            clock,
        );
        let limiter = Arc::new(RateLimiter::new(
            config.max_requests_per_hour,
            config.admins.iter().cloned(),
        ));
        Self {
            config,
            transport,
            inspector,
            engine,
            jobs,
            sessions: SessionStore::new(),
            limiter,
            stats,
            clock,
            prints: TaskTracker::new(),
        }
    }

    pub fn jobs(&self) -> &JobStore {
        &self.jobs
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn stats(&self) -> &StatsRecorder {
        &self.stats
    }

    /// A sweeper sharing this desk's stores.
    pub fn sweeper(&self) -> Sweeper {
        Sweeper::new(
            self.sessions.clone(),
            self.jobs.clone(),
            Arc::clone(&self.limiter),
            SweepSettings {
                session_timeout: self.config.session_timeout(),
                session_interval: std::time::Duration::from_secs(
                    self.config.session_sweep_interval_secs,
                ),
                job_max_age: self.config.job_max_age(),
                job_interval: std::time::Duration::from_secs(self.config.job_sweep_interval_secs),
            },
            self.clock,
        )
    }

    /// Wait for every running print to reach a terminal state.
    pub async fn drain(&self) {
        self.prints.close();
        self.prints.wait().await;
        self.prints.reopen();
    }

    /// Process one inbound message.
    ///
    /// Domain failures are answered in the conversation and return `Ok`.
    /// Only transport failures come back as errors.
    pub async fn handle(&self, msg: InboundMessage) -> Result<(), PrintError> {
        let now = self.clock.now();
        let conversation = msg.conversation_id.as_str();

        if !self.limiter.admit(&msg.sender, now) {
            info!(sender = %msg.sender, "message rejected by rate limiter");
            return self
                .reply(conversation, &prompt::error(&PrintError::RateLimited))
                .await;
        }
        self.stats
            .record_request(&msg.sender, conversation, now)
            .await;

        match self.dispatch(&msg).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_recoverable() => {
                warn!(sender = %msg.sender, conversation, error = %e, "request failed");
                self.reply(conversation, &prompt::error(&e)).await
            }
            Err(e) => Err(e),
        }
    }

    async fn dispatch(&self, msg: &InboundMessage) -> Result<(), PrintError> {
        if let Some(attachment) = &msg.attachment {
            return self.accept_file(msg, attachment).await;
        }
        let text = msg.text.trim();
        if let Some(command) = text.strip_prefix('/') {
            return self.command(msg, command).await;
        }
        self.negotiate(&msg.conversation_id, text).await
    }

    /// Validate, store and inspect an attachment, then open a session for it.
    async fn accept_file(
        &self,
        msg: &InboundMessage,
        attachment: &Attachment,
    ) -> Result<(), PrintError> {
        let extension = Path::new(&attachment.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| PrintError::Validation("file has no extension".into()))?;
        if !self.config.is_allowed_extension(&extension) {
            return Err(PrintError::Validation(format!(
                ".{extension} is not supported (allowed: {})",
                self.config.allowed_extensions.join(", ")
            )));
        }

        let size_bytes = tokio::fs::metadata(&attachment.path)
            .await
            .map_err(|_| PrintError::Validation("attachment could not be read".into()))?
            .len();
        if size_bytes == 0 {
            return Err(PrintError::Validation("file is empty".into()));
        }
        if size_bytes > self.config.max_file_size_bytes() {
            return Err(PrintError::Validation(format!(
                "file is larger than {} MB",
                self.config.max_file_size_mb
            )));
        }

        tokio::fs::create_dir_all(&self.config.upload_dir).await?;
        let stored = self
            .config
            .upload_dir
            .join(format!("{}.{extension}", Uuid::new_v4()));
        tokio::fs::copy(&attachment.path, &stored).await?;

        let analysis = match self.inspector.analyze(&stored, &extension).await {
            Ok(analysis) => analysis,
            Err(e) => {
                let _ = tokio::fs::remove_file(&stored).await;
                return Err(match e {
                    PrintError::Validation(_) => e,
                    other => PrintError::Validation(other.to_string()),
                });
            }
        };

        let now = self.clock.now();
        let job = self
            .jobs
            .create_job(
                &msg.sender,
                &msg.conversation_id,
                StoredFile {
                    file_name: attachment.file_name.clone(),
                    path: stored,
                    extension,
                    size_bytes,
                },
                analysis,
                now,
            )
            .await;

        if let Some(previous) = self.sessions.start(&msg.conversation_id, &job.id, now).await {
            self.discard_if_pending(&previous.job_id).await;
        }
        self.reply(&msg.conversation_id, &prompt::confirmation(&job))
            .await
    }

    /// Feed free text to the negotiation dialog of this conversation.
    async fn negotiate(&self, conversation: &str, text: &str) -> Result<(), PrintError> {
        let Some(session) = self.sessions.get(conversation).await else {
            return self.reply(conversation, &prompt::no_session()).await;
        };

        let Some(mut job) = self.jobs.get(&session.job_id).await else {
            self.sessions.remove(conversation).await;
            return Err(PrintError::NotFound(format!("job {}", session.job_id)));
        };
        if job.status != JobStatus::Pending {
            self.sessions.remove(conversation).await;
            return Err(PrintError::InvalidState {
                job_id: job.id,
                status: job.status,
            });
        }

        let max_copies = self.jobs.max_copies();
        let transition = Dialog::next(session.step, text, max_copies);
        debug!(
            conversation,
            from = %session.step,
            to = ?transition.next,
            "dialog transition"
        );

        for effect in transition.effects {
            match effect {
                Effect::SetCopies(n) => {
                    job = self.apply(conversation, &job.id, OptionChange::Copies(n)).await?;
                }
                Effect::SetQuality(q) => {
                    job = self.apply(conversation, &job.id, OptionChange::Quality(q)).await?;
                }
                Effect::SetPaper(p) => {
                    job = self.apply(conversation, &job.id, OptionChange::Paper(p)).await?;
                }
                Effect::ToggleDuplex => {
                    job = self.apply(conversation, &job.id, OptionChange::ToggleDuplex).await?;
                }
                Effect::Submit => {
                    self.sessions.remove(conversation).await;
                    self.reply(conversation, &prompt::printing(&job)).await?;
                    self.spawn_print(conversation, &job.id);
                }
                Effect::Cancel => {
                    self.sessions.remove(conversation).await;
                    self.jobs.remove(&job.id).await;
                    info!(job_id = %job.id, "job cancelled by owner");
                    self.reply(conversation, &prompt::cancelled()).await?;
                }
                Effect::Reply(p) => {
                    self.reply(conversation, &prompt::render(p, &job, max_copies))
                        .await?;
                }
            }
        }

        if let Some(step) = transition.next {
            self.sessions
                .advance(conversation, step, self.clock.now())
                .await;
        }
        Ok(())
    }

    /// `update_options`, dropping the session when its job is gone.
    async fn apply(
        &self,
        conversation: &str,
        job_id: &str,
        change: OptionChange,
    ) -> Result<PrintJob, PrintError> {
        match self.jobs.update_options(job_id, change).await {
            Err(e @ (PrintError::NotFound(_) | PrintError::InvalidState { .. })) => {
                self.sessions.remove(conversation).await;
                Err(e)
            }
            other => other,
        }
    }

    fn spawn_print(&self, conversation: &str, job_id: &str) {
        let engine = self.engine.clone();
        let transport = Arc::clone(&self.transport);
        let conversation = conversation.to_string();
        let job_id = job_id.to_string();
        self.prints.spawn(async move {
            let text = match engine.submit(&job_id).await {
                Ok(report) => {
                    debug!(job_id, attempts = report.attempts, "reporting completed print");
                    prompt::completed(&report.job)
                }
                Err(e) => prompt::error(&e),
            };
            if let Err(e) = transport.edit_last_reply(&conversation, &text).await {
                error!(job_id, error = %e, "failed to report print outcome");
            }
        });
    }

    async fn discard_if_pending(&self, job_id: &str) {
        if let Some(job) = self.jobs.get(job_id).await
            && job.status == JobStatus::Pending
        {
            self.jobs.remove(job_id).await;
            debug!(job_id, "replaced pending job discarded");
        }
    }

    async fn command(&self, msg: &InboundMessage, command: &str) -> Result<(), PrintError> {
        let (name, arg) = command
            .split_once(char::is_whitespace)
            .map(|(n, a)| (n, a.trim()))
            .unwrap_or((command, ""));
        let name = name.to_ascii_lowercase();
        let conversation = msg.conversation_id.as_str();
        let now = self.clock.now();

        match name.as_str() {
            "help" | "start" => {
                let remaining = self.limiter.remaining(&msg.sender, now);
                return self.reply(conversation, &prompt::help(remaining)).await;
            }
            "status" => {
                let text = self.user_status(&msg.sender, conversation).await;
                return self.reply(conversation, &text).await;
            }
            _ => {}
        }

        if !self.config.is_admin(&msg.sender) {
            return self.reply(conversation, &unknown_command(&name)).await;
        }

        let text = match name.as_str() {
            "stats" => self.render_stats().await,
            "top" | "leaderboard" => self.render_leaderboard().await,
            "queue" => self.render_queue().await,
            "printer" => {
                if self.engine.is_online().await {
                    "🟢 Printer online".to_string()
                } else {
                    "🔴 Printer offline".to_string()
                }
            }
            "testprint" => self.test_print().await,
            "broadcast" if arg.is_empty() => "Usage: /broadcast <message>".to_string(),
            "broadcast" => {
                let window = chrono::Duration::days(self.config.broadcast_window_days);
                let recipients = self.stats.recently_active(now, window).await;
                let mut sent = 0;
                for (_, target) in &recipients {
                    if target == conversation {
                        continue;
                    }
                    self.reply(target, &format!("📢 {arg}")).await?;
                    sent += 1;
                }
                info!(sent, "broadcast delivered");
                format!("Broadcast sent to {sent} users")
            }
            _ => unknown_command(&name),
        };
        self.reply(conversation, &text).await
    }

    async fn user_status(&self, sender: &str, conversation: &str) -> String {
        let mut out = String::new();
        if let Some(session) = self.sessions.get(conversation).await
            && let Some(job) = self.jobs.get(&session.job_id).await
        {
            let _ = writeln!(out, "Menunggu konfirmasi ({}):", session.step);
            let _ = writeln!(out, "{}", prompt::confirmation(&job));
        }
        let own: Vec<PrintJob> = self
            .jobs
            .list()
            .await
            .into_iter()
            .filter(|j| j.owner == sender && j.status != JobStatus::Pending)
            .collect();
        for job in &own {
            let _ = writeln!(out, "• {} [{}] {}", job.short_id(), job.status, job.file_name);
        }
        if let Some(stat) = self.stats.user(sender).await {
            let _ = writeln!(
                out,
                "Total: {} cetak, {} halaman",
                stat.total_prints, stat.total_pages
            );
        }
        if out.is_empty() {
            prompt::no_session()
        } else {
            out.trim_end().to_string()
        }
    }

    async fn render_stats(&self) -> String {
        let summary = self.stats.summary().await;
        format!(
            "📊 Stats\nUsers: {}\nRequests: {}\nCompleted: {}\nFailed: {}\nPages: {}\nRevenue: Rp{}\nLive jobs: {}\nSessions: {}",
            summary.users,
            summary.total_requests,
            summary.totals.jobs_completed,
            summary.totals.jobs_failed,
            summary.totals.pages_printed,
            summary.totals.revenue,
            self.jobs.len().await,
            self.sessions.len().await,
        )
    }

    async fn render_leaderboard(&self) -> String {
        let top = self.stats.leaderboard(LEADERBOARD_SIZE).await;
        if top.is_empty() {
            return "No prints yet".to_string();
        }
        let mut out = String::from("🏆 Top users");
        for (rank, (sender, stat)) in top.iter().enumerate() {
            let _ = write!(
                out,
                "\n{}. {} - {} pages, {} prints",
                rank + 1,
                sender,
                stat.total_pages,
                stat.total_prints
            );
        }
        out
    }

    async fn render_queue(&self) -> String {
        let jobs = self.jobs.list().await;
        let mut out = format!("🗂️ Queue ({} jobs)", jobs.len());
        for job in &jobs {
            let _ = write!(
                out,
                "\n• {} [{}] {} by {} - {}p × {} - Rp{} (attempts: {})",
                job.short_id(),
                job.status,
                job.file_name,
                job.owner,
                job.pages,
                job.copies,
                job.estimated_cost,
                job.attempts
            );
        }
        let recent = self.stats.recent(QUEUE_HISTORY_SIZE).await;
        if !recent.is_empty() {
            out.push_str("\nRecent:");
            for entry in &recent {
                let _ = write!(
                    out,
                    "\n• {} [{}] {} ({} ms)",
                    &entry.job_id[..8.min(entry.job_id.len())],
                    entry.status,
                    entry.file_name,
                    entry.duration_ms
                );
            }
        }
        out
    }

    async fn test_print(&self) -> String {
        let path = self
            .config
            .upload_dir
            .join(format!("testprint-{}.txt", Uuid::new_v4()));
        let body = format!("printdesk test page\n{}\n", self.clock.now().to_rfc3339());
        let written = async {
            tokio::fs::create_dir_all(&self.config.upload_dir).await?;
            tokio::fs::write(&path, body).await
        }
        .await;
        if let Err(e) = written {
            return prompt::error(&PrintError::Io(e));
        }

        let request = PrintRequest {
            path: path.clone(),
            copies: 1,
            options: PrintOptions::default(),
        };
        let result = self.engine.print_once(&request).await;
        let _ = tokio::fs::remove_file(&path).await;
        match result {
            Ok(()) => "✅ Test page sent".to_string(),
            Err(e) => prompt::error(&e),
        }
    }

    async fn reply(&self, conversation: &str, text: &str) -> Result<(), PrintError> {
        self.transport.reply(conversation, text).await
    }
}

fn unknown_command(name: &str) -> String {
    format!("Perintah /{name} tidak dikenal. Ketik /help.")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{FileAnalysis, PaperSize, Quality};
    use crate::testing::{RecordingTransport, ScriptedPrinter, StubInspector};
    use crate::transport::OutboundEvent;
    use std::path::PathBuf;

    type TestDesk = PrintDesk<RecordingTransport, ScriptedPrinter, StubInspector>;

    struct Fixture {
        desk: TestDesk,
        transport: Arc<RecordingTransport>,
        printer: Arc<ScriptedPrinter>,
        dir: tempfile::TempDir,
    }

    fn fixture_with(config: DeskConfig, printer: ScriptedPrinter, analysis: FileAnalysis) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let config = DeskConfig {
            upload_dir: dir.path().join("uploads"),
            data_dir: dir.path().join("data"),
            ..config
        };
        let transport = Arc::new(RecordingTransport::default());
        let printer = Arc::new(printer);
        let desk = PrintDesk::new(
            config,
            Arc::clone(&transport),
            Arc::clone(&printer),
            StubInspector(analysis),
            StatsRecorder::in_memory(100, 1000),
            Clock::follow_tokio(),
        );
        Fixture {
            desk,
            transport,
            printer,
            dir,
        }
    }

    fn bw(pages: u32) -> FileAnalysis {
        FileAnalysis {
            pages,
            has_color: false,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(
            DeskConfig {
                admins: vec!["admin".into()],
                ..DeskConfig::default()
            },
            ScriptedPrinter::always_ok(),
            bw(3),
        )
    }

    fn text(sender: &str, body: &str) -> InboundMessage {
        InboundMessage {
            sender: sender.into(),
            conversation_id: format!("chat-{sender}"),
            text: body.into(),
            attachment: None,
        }
    }

    fn upload(f: &Fixture, sender: &str, name: &str) -> InboundMessage {
        let path: PathBuf = f.dir.path().join(format!("incoming-{name}"));
        std::fs::write(&path, b"%PDF-1.4 test").unwrap();
        InboundMessage {
            sender: sender.into(),
            conversation_id: format!("chat-{sender}"),
            text: String::new(),
            attachment: Some(Attachment {
                file_name: name.into(),
                path,
            }),
        }
    }

    async fn send(f: &Fixture, msg: InboundMessage) {
        f.desk.handle(msg).await.unwrap();
    }

    async fn current_job(f: &Fixture, sender: &str) -> PrintJob {
        let session = f
            .desk
            .sessions()
            .get(&format!("chat-{sender}"))
            .await
            .unwrap();
        f.desk.jobs().get(&session.job_id).await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn confirm_prints_and_records_stats() {
        let f = fixture();
        send(&f, upload(&f, "u1", "skripsi.pdf")).await;

        let confirmation = f.transport.last_text("chat-u1");
        assert!(confirmation.contains("skripsi.pdf"));
        assert!(confirmation.contains("Rp1500"));
        let job_id = current_job(&f, "u1").await.id;

        send(&f, text("u1", "YA")).await;
        assert!(f.desk.sessions().get("chat-u1").await.is_none());
        f.desk.drain().await;

        let job = f.desk.jobs().get(&job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(f.printer.calls(), 1);

        let user = f.desk.stats().user("u1").await.unwrap();
        assert_eq!(user.total_pages, 3);
        assert_eq!(user.total_prints, 1);
        let history = f.desk.stats().recent(10).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, JobStatus::Completed);

        let events = f.transport.events();
        assert!(matches!(events.last(), Some(OutboundEvent::Edit { text, .. }) if text.contains("Selesai")));
    }

    #[tokio::test(start_paused = true)]
    async fn options_then_copies_scales_cost() {
        let f = fixture();
        send(&f, upload(&f, "u1", "tugas.pdf")).await;
        let single = current_job(&f, "u1").await.estimated_cost;

        send(&f, text("u1", "OPSI")).await;
        send(&f, text("u1", "1")).await;
        assert_eq!(
            f.desk.sessions().get("chat-u1").await.unwrap().step,
            crate::dialog::Step::SetCopies
        );
        send(&f, text("u1", "7")).await;

        let job = current_job(&f, "u1").await;
        assert_eq!(job.copies, 7);
        assert_eq!(job.estimated_cost, single * 7);
        assert_eq!(
            f.desk.sessions().get("chat-u1").await.unwrap().step,
            crate::dialog::Step::SetOptions
        );
    }

    #[tokio::test(start_paused = true)]
    async fn option_menu_changes_apply_and_return_to_confirm() {
        let f = fixture();
        send(&f, upload(&f, "u1", "tugas.pdf")).await;
        send(&f, text("u1", "opsi")).await;
        send(&f, text("u1", "4")).await;
        send(&f, text("u1", "2")).await;
        assert!(f.transport.last_text("chat-u1").contains("DRAFT"));
        send(&f, text("u1", "high")).await;
        send(&f, text("u1", "3")).await;
        send(&f, text("u1", "a3")).await;
        send(&f, text("u1", "5")).await;

        let job = current_job(&f, "u1").await;
        assert!(job.options.duplex);
        assert_eq!(job.options.quality, Quality::High);
        assert_eq!(job.options.paper, PaperSize::A3);
        assert_eq!(
            f.desk.sessions().get("chat-u1").await.unwrap().step,
            crate::dialog::Step::ConfirmPrint
        );
        assert!(f.transport.last_text("chat-u1").contains("Kertas: A3"));
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_copies_keep_step() {
        let f = fixture();
        send(&f, upload(&f, "u1", "tugas.pdf")).await;
        send(&f, text("u1", "OPSI")).await;
        send(&f, text("u1", "1")).await;
        send(&f, text("u1", "11")).await;

        assert_eq!(current_job(&f, "u1").await.copies, 1);
        assert_eq!(
            f.desk.sessions().get("chat-u1").await.unwrap().step,
            crate::dialog::Step::SetCopies
        );
        assert!(f.transport.last_text("chat-u1").contains("1-10"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_removes_job_and_file() {
        let f = fixture();
        send(&f, upload(&f, "u1", "tugas.pdf")).await;
        let job = current_job(&f, "u1").await;
        assert!(job.file_path.exists());

        send(&f, text("u1", "batal")).await;
        assert!(f.desk.sessions().get("chat-u1").await.is_none());
        assert!(f.desk.jobs().get(&job.id).await.is_none());
        assert!(!job.file_path.exists());
        assert_eq!(f.printer.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limited_attachment_creates_no_job() {
        let f = fixture_with(
            DeskConfig {
                max_requests_per_hour: 2,
                ..DeskConfig::default()
            },
            ScriptedPrinter::always_ok(),
            bw(1),
        );
        send(&f, text("u1", "/help")).await;
        send(&f, text("u1", "halo")).await;
        send(&f, upload(&f, "u1", "tugas.pdf")).await;

        assert_eq!(f.desk.jobs().len().await, 0);
        assert!(f.desk.sessions().get("chat-u1").await.is_none());
        assert!(f.transport.last_text("chat-u1").contains("Terlalu banyak"));
        assert_eq!(f.desk.stats().user("u1").await.unwrap().total_requests, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unsupported_or_oversized_files_are_rejected() {
        let f = fixture_with(
            DeskConfig {
                max_file_size_mb: 0,
                ..DeskConfig::default()
            },
            ScriptedPrinter::always_ok(),
            bw(1),
        );
        send(&f, upload(&f, "u1", "virus.exe")).await;
        assert!(f.transport.last_text("chat-u1").contains(".exe"));

        send(&f, upload(&f, "u1", "big.pdf")).await;
        assert!(f.transport.last_text("chat-u1").contains("File ditolak"));
        assert_eq!(f.desk.jobs().len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dangling_session_is_dropped_with_not_found() {
        let f = fixture();
        send(&f, upload(&f, "u1", "tugas.pdf")).await;
        let job = current_job(&f, "u1").await;
        f.desk.jobs().remove(&job.id).await;

        send(&f, text("u1", "YA")).await;
        assert!(f.desk.sessions().get("chat-u1").await.is_none());
        assert!(f.transport.last_text("chat-u1").contains("tidak ditemukan"));
        assert_eq!(f.printer.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn text_without_session_gets_hint() {
        let f = fixture();
        send(&f, text("u1", "YA")).await;
        assert!(f.transport.last_text("chat-u1").contains("Kirim dokumen"));
        assert_eq!(f.desk.jobs().len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn new_upload_replaces_pending_job() {
        let f = fixture();
        send(&f, upload(&f, "u1", "a.pdf")).await;
        let first = current_job(&f, "u1").await;
        send(&f, upload(&f, "u1", "b.pdf")).await;
        let second = current_job(&f, "u1").await;

        assert_ne!(first.id, second.id);
        assert!(f.desk.jobs().get(&first.id).await.is_none());
        assert_eq!(f.desk.jobs().len().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn offline_printer_reports_failure() {
        let f = fixture_with(DeskConfig::default(), ScriptedPrinter::offline(), bw(2));
        send(&f, upload(&f, "u1", "a.pdf")).await;
        let job_id = current_job(&f, "u1").await.id;
        send(&f, text("u1", "ok")).await;
        f.desk.drain().await;

        assert_eq!(
            f.desk.jobs().get(&job_id).await.unwrap().status,
            JobStatus::Failed
        );
        assert_eq!(f.printer.calls(), 0);
        assert!(f.transport.last_text("chat-u1").contains("offline"));
        assert_eq!(f.desk.stats().user("u1").await.unwrap().total_pages, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn crashed_health_check_is_reported_and_job_failed() {
        let f = fixture_with(
            DeskConfig::default(),
            ScriptedPrinter::panicking_health_check(),
            bw(2),
        );
        send(&f, upload(&f, "u1", "a.pdf")).await;
        let job_id = current_job(&f, "u1").await.id;
        send(&f, text("u1", "ya")).await;
        f.desk.drain().await;

        assert_eq!(
            f.desk.jobs().get(&job_id).await.unwrap().status,
            JobStatus::Failed
        );
        assert!(f.transport.last_text("chat-u1").contains("sistem"));
        assert_eq!(f.desk.stats().recent(10).await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn admin_commands_are_restricted() {
        let f = fixture();
        send(&f, text("u1", "/stats")).await;
        assert!(f.transport.last_text("chat-u1").contains("tidak dikenal"));

        send(&f, upload(&f, "u1", "a.pdf")).await;
        send(&f, text("u1", "ya")).await;
        f.desk.drain().await;

        send(&f, text("admin", "/stats")).await;
        let stats = f.transport.last_text("chat-admin");
        assert!(stats.contains("Completed: 1"));
        assert!(stats.contains("Pages: 3"));

        send(&f, text("admin", "/queue")).await;
        assert!(f.transport.last_text("chat-admin").contains("a.pdf"));

        send(&f, text("admin", "/top")).await;
        assert!(f.transport.last_text("chat-admin").contains("1. u1 - 3 pages"));

        send(&f, text("admin", "/printer")).await;
        assert!(f.transport.last_text("chat-admin").contains("online"));
    }

    #[tokio::test(start_paused = true)]
    async fn broadcast_reaches_recent_users() {
        let f = fixture();
        send(&f, text("u1", "halo")).await;
        send(&f, text("u2", "halo")).await;
        send(&f, text("admin", "/broadcast Printer libur besok")).await;

        assert!(f.transport.last_text("chat-u1").contains("Printer libur besok"));
        assert!(f.transport.last_text("chat-u2").contains("Printer libur besok"));
        assert!(f.transport.last_text("chat-admin").contains("sent to 2 users"));
    }

    #[tokio::test(start_paused = true)]
    async fn admin_test_print_leaves_no_job() {
        let f = fixture();
        send(&f, text("admin", "/testprint")).await;
        assert!(f.transport.last_text("chat-admin").contains("Test page sent"));
        assert_eq!(f.printer.calls(), 1);
        assert_eq!(f.desk.jobs().len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn user_status_lists_pending_confirmation() {
        let f = fixture();
        send(&f, upload(&f, "u1", "a.pdf")).await;
        send(&f, text("u1", "/status")).await;
        let status = f.transport.last_text("chat-u1");
        assert!(status.contains("CONFIRM_PRINT"));
        assert!(status.contains("a.pdf"));
    }
}
