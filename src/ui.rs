//! Interface de terminal do printdesk: spinners e saída colorida.
//!
//! Usa `indicatif` para o spinner das operações de impressora e `console`
//! para estilizar o relatório de estatísticas do subcomando `status`.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::error::PrintError;
use crate::job::HistoryEntry;
use crate::job::JobStatus;
use crate::stats::{Summary, UserStat};

/// Indicador visual de progresso para uma operação de impressora.
///
/// Exibe um spinner enquanto a operação roda e uma linha colorida com o
/// resultado: verde para sucesso, vermelho para falha.
pub struct PrintProgress {
    pb: ProgressBar,
    green: Style,
    red: Style,
}

impl PrintProgress {
    /// Inicia o spinner com a mensagem indicada.
    pub fn start(message: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
        }
    }

    /// Finaliza o spinner e exibe o resultado.
    pub fn complete(&self, result: &Result<String, PrintError>) {
        self.pb.finish_and_clear();
        match result {
            Ok(message) => println!("  {} {message}", self.green.apply_to("✓")),
            Err(e) => println!("  {} {e}", self.red.apply_to("✗")),
        }
    }
}

/// Imprime o resumo geral, o ranking e o histórico recente.
pub fn print_report(summary: &Summary, top: &[(String, UserStat)], recent: &[HistoryEntry]) {
    let header = Style::new().cyan().bold();
    let dim = Style::new().dim();

    println!("{}", header.apply_to("─── Print desk ───"));
    println!("  Users:      {}", summary.users);
    println!("  Requests:   {}", summary.total_requests);
    println!(
        "  Jobs:       {} completed, {} failed",
        summary.totals.jobs_completed, summary.totals.jobs_failed
    );
    println!("  Pages:      {}", summary.totals.pages_printed);
    println!("  Revenue:    Rp{}", summary.totals.revenue);
    println!("  History:    {} entries", summary.history_len);

    println!();
    println!("{}", header.apply_to("─── Top users ───"));
    if top.is_empty() {
        println!("  {}", dim.apply_to("no prints yet"));
    }
    for (rank, (sender, stat)) in top.iter().enumerate() {
        println!(
            "  {:>2}. {sender}  {} pages, {} prints, {} requests",
            rank + 1,
            stat.total_pages,
            stat.total_prints,
            stat.total_requests
        );
    }

    if !recent.is_empty() {
        println!();
        println!("{}", header.apply_to("─── Recent jobs ───"));
        for entry in recent {
            println!("  {} {}", status_style(entry.status).apply_to(entry.status), history_line(entry));
        }
    }
}

fn status_style(status: JobStatus) -> Style {
    match status {
        JobStatus::Completed => Style::new().green(),
        JobStatus::Failed => Style::new().red(),
        _ => Style::new().yellow(),
    }
}

fn history_line(entry: &HistoryEntry) -> String {
    format!(
        "{} {} ({} × {}p, Rp{}) {}",
        entry.finished_at.format("%Y-%m-%d %H:%M"),
        entry.file_name,
        entry.copies,
        entry.pages,
        entry.cost,
        entry.owner
    )
}
