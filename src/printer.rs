//! Printer service boundary and the CUPS command-line adapter.

use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::job::{PrintJob, PrintOptions};

/// Everything the printer needs to know about one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintRequest {
    pub path: PathBuf,
    pub copies: u8,
    pub options: PrintOptions,
}

impl From<&PrintJob> for PrintRequest {
    fn from(job: &PrintJob) -> Self {
        Self {
            path: job.file_path.clone(),
            copies: job.copies,
            options: job.options,
        }
    }
}

/// A single physical printer.
pub trait PrinterService: Send + Sync + 'static {
    /// Whether the printer currently accepts work.
    fn check_online(&self) -> impl Future<Output = bool> + Send;

    /// One print attempt. `false` means the attempt failed.
    fn print(&self, request: &PrintRequest) -> impl Future<Output = bool> + Send;
}

/// Prints through the CUPS `lp` and `lpstat` commands.
pub struct LpPrinter {
    printer_name: Option<String>,
    timeout: Duration,
}

impl LpPrinter {
    pub fn new(printer_name: &str, timeout: Duration) -> Self {
        let printer_name = if printer_name.trim().is_empty() {
            None
        } else {
            Some(printer_name.trim().to_string())
        };
        Self {
            printer_name,
            timeout,
        }
    }

    /// Arguments passed to `lp` for a request.
    pub fn lp_args(&self, request: &PrintRequest) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(name) = &self.printer_name {
            args.push("-d".to_string());
            args.push(name.clone());
        }
        args.push("-n".to_string());
        args.push(request.copies.to_string());
        args.push("-o".to_string());
        args.push(if request.options.duplex {
            "sides=two-sided-long-edge".to_string()
        } else {
            "sides=one-sided".to_string()
        });
        args.push("-o".to_string());
        args.push(format!("media={}", request.options.paper.media()));
        args.push("-o".to_string());
        args.push(format!("print-quality={}", request.options.quality.ipp_value()));
        args.push(request.path.display().to_string());
        args
    }

    /// Runs a command under the timeout. The child is killed if it overruns.
    async fn run(&self, program: &str, args: &[String]) -> Option<std::process::Output> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();
        match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => Some(output),
            Ok(Err(e)) => {
                warn!(program, error = %e, "failed to spawn printer command");
                None
            }
            Err(_) => {
                warn!(program, timeout_secs = self.timeout.as_secs(), "printer command timed out");
                None
            }
        }
    }
}

/// Interprets `lpstat -p` output. Placeholder heuristic: an enabled queue
/// reports itself as idle or printing.
pub fn lpstat_reports_online(stdout: &str) -> bool {
    let lower = stdout.to_lowercase();
    !lower.contains("disabled") && (lower.contains("idle") || lower.contains("printing"))
}

impl PrinterService for LpPrinter {
    async fn check_online(&self) -> bool {
        let mut args = vec!["-p".to_string()];
        if let Some(name) = &self.printer_name {
            args.push(name.clone());
        }
        match self.run("lpstat", &args).await {
            Some(output) if output.status.success() => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let online = lpstat_reports_online(&stdout);
                debug!(online, "lpstat checked");
                online
            }
            Some(output) => {
                debug!(
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "lpstat reported an error"
                );
                false
            }
            None => false,
        }
    }

    async fn print(&self, request: &PrintRequest) -> bool {
        let args = self.lp_args(request);
        match self.run("lp", &args).await {
            Some(output) if output.status.success() => {
                debug!(
                    stdout = %String::from_utf8_lossy(&output.stdout).trim(),
                    "lp accepted job"
                );
                true
            }
            Some(output) => {
                warn!(
                    code = ?output.status.code(),
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "lp rejected job"
                );
                false
            }
            None => false,
        }
    }
}
