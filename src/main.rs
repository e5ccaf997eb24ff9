mod cli;
mod clock;
mod config;
mod desk;
mod dialog;
mod error;
mod executor;
mod inspector;
mod job;
mod logging;
mod printer;
mod rate_limit;
mod stats;
mod sweeper;
#[cfg(test)]
mod testing;
mod transport;
mod ui;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use cli::{Cli, Command};
use clock::Clock;
use config::DeskConfig;
use desk::PrintDesk;
use error::PrintError;
use executor::ExecutionEngine;
use inspector::BasicInspector;
use job::{JobStore, PrintOptions};
use printer::{LpPrinter, PrintRequest};
use stats::StatsRecorder;
use transport::{InboundReader, StdioTransport};
use ui::PrintProgress;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    let config = DeskConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Serve => serve(config).await,
        Command::Status { top } => status(&config, top).await,
        Command::CheckPrinter => check_printer(config).await,
        Command::TestPrint { file, copies } => test_print(config, file, copies).await,
    }
}

async fn serve(config: DeskConfig) -> Result<()> {
    let stats = StatsRecorder::load(
        &config.stats_path(),
        config.history_live_cap,
        config.history_persist_cap,
    )
    .await
    .context("failed to load stats snapshot")?;
    let printer = Arc::new(LpPrinter::new(
        &config.printer_name,
        Duration::from_secs(config.print_timeout_secs),
    ));
    let flush_every = Duration::from_secs(config.stats_flush_interval_secs);

    let desk = PrintDesk::new(
        config,
        Arc::new(StdioTransport::stdout()),
        printer,
        BasicInspector,
        stats.clone(),
        Clock::new(),
    );

    let cancel = CancellationToken::new();
    let sweeper = desk.sweeper().spawn(cancel.clone());
    let flusher = spawn_flusher(stats.clone(), flush_every, cancel.clone());

    info!("print desk serving on stdio");
    let mut reader = InboundReader::new(BufReader::new(tokio::io::stdin()));
    let outcome = loop {
        tokio::select! {
            next = reader.next() => match next {
                Ok(Some(Ok(msg))) => {
                    if let Err(e) = desk.handle(msg).await {
                        break Err(e);
                    }
                }
                Ok(Some(Err(e))) => warn!(error = %e, "skipping malformed inbound line"),
                Ok(None) => {
                    info!("input closed");
                    break Ok(());
                }
                Err(e) => break Err(e),
            },
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received");
                break Ok(());
            }
        }
    };

    cancel.cancel();
    desk.drain().await;
    for (task, handle) in [("sweeper", sweeper), ("stats flusher", flusher)] {
        if let Err(e) = handle.await
            && !e.is_cancelled()
        {
            error!(task, error = %e, "background task crashed");
        }
    }
    if let Err(e) = stats.flush().await {
        error!(error = %e, "final stats flush failed");
    }
    info!(
        open_jobs = desk.jobs().len().await,
        open_sessions = desk.sessions().len().await,
        "print desk stopped"
    );

    outcome.context("print desk stopped on a transport failure")
}

fn spawn_flusher(
    stats: StatsRecorder,
    every: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(every);
        tick.tick().await;
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    if let Err(e) = stats.flush().await {
                        warn!(error = %e, "stats flush failed");
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
    })
}

async fn status(config: &DeskConfig, top: usize) -> Result<()> {
    let stats = StatsRecorder::load(
        &config.stats_path(),
        config.history_live_cap,
        config.history_persist_cap,
    )
    .await
    .context("failed to load stats snapshot")?;

    let summary = stats.summary().await;
    let leaderboard = stats.leaderboard(top).await;
    let recent = stats.recent(10).await;
    ui::print_report(&summary, &leaderboard, &recent);
    Ok(())
}

/// Engine without a desk, for the one-shot printer subcommands.
fn standalone_engine(config: &DeskConfig) -> ExecutionEngine<LpPrinter> {
    let printer = Arc::new(LpPrinter::new(
        &config.printer_name,
        Duration::from_secs(config.print_timeout_secs),
    ));
    ExecutionEngine::new(
        printer,
        JobStore::new(config.tariff(), config.default_copies, config.max_copies),
        StatsRecorder::in_memory(1, 1),
        config.retry_policy(),
        config.cleanup_delay(),
        Clock::new(),
    )
}

async fn check_printer(config: DeskConfig) -> Result<()> {
    let engine = standalone_engine(&config);
    let progress = PrintProgress::start("Checking printer...");
    let result = if engine.is_online().await {
        Ok("Printer online".to_string())
    } else {
        Err(PrintError::PrinterOffline)
    };
    progress.complete(&result);
    result.map(|_| ()).map_err(Into::into)
}

async fn test_print(config: DeskConfig, file: PathBuf, copies: u8) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("file not found: {}", file.display());
    }
    let engine = standalone_engine(&config);
    let request = PrintRequest {
        path: file.clone(),
        copies: copies.clamp(1, config.max_copies),
        options: PrintOptions::default(),
    };

    let progress = PrintProgress::start(&format!("Printing {}...", file.display()));
    let result = engine
        .print_once(&request)
        .await
        .map(|()| format!("Sent {} ({} copies)", file.display(), request.copies));
    progress.complete(&result);
    result.map(|_| ()).map_err(Into::into)
}
