//! Configuração do printdesk carregada a partir de `printdesk.toml`.
//!
//! A struct [`DeskConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! As variáveis de ambiente `PRINTDESK_PRINTER` e `PRINTDESK_ADMINS` têm
//! precedência sobre o arquivo.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::executor::RetryPolicy;
use crate::job::Tariff;

/// Arquivo de configuração procurado no diretório atual.
pub const DEFAULT_CONFIG_FILE: &str = "printdesk.toml";

/// Configuração de nível superior carregada de `printdesk.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct DeskConfig {
    /// Nome da fila CUPS. Vazio usa a impressora padrão do sistema.
    #[serde(default)]
    pub printer_name: String,

    /// Remetentes com acesso aos comandos de administração e sem rate limit.
    #[serde(default)]
    pub admins: Vec<String>,

    /// Máximo de mensagens aceitas por remetente na última hora.
    #[serde(default = "default_max_requests_per_hour")]
    pub max_requests_per_hour: u32,

    /// Número de cópias de um job recém-criado.
    #[serde(default = "default_copies")]
    pub default_copies: u8,

    /// Limite superior de cópias por job.
    #[serde(default = "default_max_copies")]
    pub max_copies: u8,

    /// Tamanho máximo de arquivo aceito, em megabytes.
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,

    /// Extensões aceitas (minúsculas, sem ponto).
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,

    /// Preço por página preto e branco.
    #[serde(default = "default_bw_rate")]
    pub bw_rate: u64,

    /// Preço por página colorida.
    #[serde(default = "default_color_rate")]
    pub color_rate: u64,

    /// Diretório onde os arquivos recebidos são guardados até a impressão.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Diretório do snapshot de estatísticas.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: u64,

    #[serde(default = "default_session_sweep_interval_secs")]
    pub session_sweep_interval_secs: u64,

    #[serde(default = "default_job_max_age_secs")]
    pub job_max_age_secs: u64,

    #[serde(default = "default_job_sweep_interval_secs")]
    pub job_sweep_interval_secs: u64,

    /// Tempo que um job terminado continua visível na fila.
    #[serde(default = "default_cleanup_delay_secs")]
    pub cleanup_delay_secs: u64,

    /// Tentativas de impressão antes de marcar o job como falho.
    #[serde(default = "default_max_print_attempts")]
    pub max_print_attempts: u32,

    /// Atraso fixo entre tentativas, em milissegundos.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Tempo máximo de uma tentativa de impressão.
    #[serde(default = "default_print_timeout_secs")]
    pub print_timeout_secs: u64,

    #[serde(default = "default_stats_flush_interval_secs")]
    pub stats_flush_interval_secs: u64,

    /// Entradas de histórico mantidas na visão ao vivo.
    #[serde(default = "default_history_live_cap")]
    pub history_live_cap: usize,

    /// Entradas de histórico gravadas no snapshot.
    #[serde(default = "default_history_persist_cap")]
    pub history_persist_cap: usize,

    /// Janela de atividade considerada pelo broadcast, em dias.
    #[serde(default = "default_broadcast_window_days")]
    pub broadcast_window_days: i64,
}

fn default_max_requests_per_hour() -> u32 {
    20
}

fn default_copies() -> u8 {
    1
}

fn default_max_copies() -> u8 {
    10
}

fn default_max_file_size_mb() -> u64 {
    20
}

fn default_allowed_extensions() -> Vec<String> {
    ["pdf", "doc", "docx", "txt", "jpg", "jpeg", "png"]
        .into_iter()
        .map(String::from)
        .collect()
}

// Valores em rupiah.
fn default_bw_rate() -> u64 {
    500
}

fn default_color_rate() -> u64 {
    1000
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_session_timeout_secs() -> u64 {
    15 * 60
}

fn default_session_sweep_interval_secs() -> u64 {
    5 * 60
}

fn default_job_max_age_secs() -> u64 {
    60 * 60
}

fn default_job_sweep_interval_secs() -> u64 {
    30 * 60
}

fn default_cleanup_delay_secs() -> u64 {
    5 * 60
}

fn default_max_print_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    2000
}

fn default_print_timeout_secs() -> u64 {
    30
}

fn default_stats_flush_interval_secs() -> u64 {
    5 * 60
}

fn default_history_live_cap() -> usize {
    100
}

fn default_history_persist_cap() -> usize {
    1000
}

fn default_broadcast_window_days() -> i64 {
    7
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            printer_name: String::new(),
            admins: Vec::new(),
            max_requests_per_hour: default_max_requests_per_hour(),
            default_copies: default_copies(),
            max_copies: default_max_copies(),
            max_file_size_mb: default_max_file_size_mb(),
            allowed_extensions: default_allowed_extensions(),
            bw_rate: default_bw_rate(),
            color_rate: default_color_rate(),
            upload_dir: default_upload_dir(),
            data_dir: default_data_dir(),
            session_timeout_secs: default_session_timeout_secs(),
            session_sweep_interval_secs: default_session_sweep_interval_secs(),
            job_max_age_secs: default_job_max_age_secs(),
            job_sweep_interval_secs: default_job_sweep_interval_secs(),
            cleanup_delay_secs: default_cleanup_delay_secs(),
            max_print_attempts: default_max_print_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            print_timeout_secs: default_print_timeout_secs(),
            stats_flush_interval_secs: default_stats_flush_interval_secs(),
            history_live_cap: default_history_live_cap(),
            history_persist_cap: default_history_persist_cap(),
            broadcast_window_days: default_broadcast_window_days(),
        }
    }
}

impl DeskConfig {
    /// Carrega a configuração do caminho indicado, ou de `printdesk.toml`
    /// no diretório atual. Usa valores padrão se o arquivo não existir.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let explicit = path.is_some();
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str::<DeskConfig>(&contents)?
        } else if explicit {
            bail!("config file not found: {}", path.display());
        } else {
            Self::default()
        };

        // Variáveis de ambiente têm precedência sobre o arquivo.
        if let Ok(name) = std::env::var("PRINTDESK_PRINTER")
            && !name.is_empty()
        {
            config.printer_name = name;
        }
        if let Ok(admins) = std::env::var("PRINTDESK_ADMINS")
            && !admins.is_empty()
        {
            config.admins = admins
                .split(',')
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect();
        }

        config.validate()?;
        Ok(config)
    }

    /// Rejeita combinações que quebrariam as invariantes dos jobs.
    pub fn validate(&self) -> Result<()> {
        if self.max_copies == 0 || self.max_copies > 10 {
            bail!("max_copies must be between 1 and 10");
        }
        if self.default_copies == 0 || self.default_copies > self.max_copies {
            bail!("default_copies must be between 1 and max_copies");
        }
        if self.max_print_attempts == 0 {
            bail!("max_print_attempts must be at least 1");
        }
        if self.max_requests_per_hour == 0 {
            bail!("max_requests_per_hour must be at least 1");
        }
        // Intervalos zerados derrubariam as tarefas periódicas.
        for (name, secs) in [
            ("session_sweep_interval_secs", self.session_sweep_interval_secs),
            ("job_sweep_interval_secs", self.job_sweep_interval_secs),
            ("stats_flush_interval_secs", self.stats_flush_interval_secs),
        ] {
            if secs == 0 {
                bail!("{name} must be at least 1");
            }
        }
        Ok(())
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb * 1024 * 1024
    }

    /// Verifica se a extensão (sem ponto, qualquer caixa) é aceita.
    pub fn is_allowed_extension(&self, ext: &str) -> bool {
        let ext = ext.to_ascii_lowercase();
        self.allowed_extensions.iter().any(|a| a.eq_ignore_ascii_case(&ext))
    }

    pub fn is_admin(&self, sender: &str) -> bool {
        self.admins.iter().any(|a| a == sender)
    }

    pub fn tariff(&self) -> Tariff {
        Tariff {
            bw_rate: self.bw_rate,
            color_rate: self.color_rate,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_print_attempts,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
            attempt_timeout: Duration::from_secs(self.print_timeout_secs),
        }
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    pub fn job_max_age(&self) -> Duration {
        Duration::from_secs(self.job_max_age_secs)
    }

    pub fn cleanup_delay(&self) -> Duration {
        Duration::from_secs(self.cleanup_delay_secs)
    }

    pub fn stats_path(&self) -> PathBuf {
        self.data_dir.join("stats.json")
    }
}
