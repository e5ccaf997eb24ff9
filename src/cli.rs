//! Interface de linha de comando do printdesk baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (serve, status,
//! check-printer, test-print) e flags globais (--config, --verbose).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// printdesk: balcão de impressão operado por chat.
#[derive(Debug, Parser)]
#[command(name = "printdesk", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração TOML (padrão: ./printdesk.toml, se existir).
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Habilita logs detalhados (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Atende mensagens JSON pela entrada padrão e responde pela saída padrão.
    Serve,

    /// Mostra as estatísticas persistidas e o ranking de usuários.
    Status {
        /// Quantidade de usuários no ranking.
        #[arg(long, default_value_t = 10)]
        top: usize,
    },

    /// Verifica se a impressora configurada está online.
    CheckPrinter,

    /// Envia um arquivo diretamente para a impressora, sem negociação.
    TestPrint {
        /// Arquivo a imprimir.
        file: PathBuf,

        /// Número de cópias.
        #[arg(long, default_value_t = 1)]
        copies: u8,
    },
}
