//! User-facing message texts.

use crate::error::PrintError;
use crate::job::{PaperSize, PrintJob, Quality};

use super::state::Prompt;

pub fn render(prompt: Prompt, job: &PrintJob, max_copies: u8) -> String {
    match prompt {
        Prompt::Confirm => confirmation(job),
        Prompt::Options => options_menu(job),
        Prompt::AskCopies => format!("Berapa copy? Kirim angka 1-{max_copies}."),
        Prompt::QualityMenu => {
            let names: Vec<String> = Quality::ALL.iter().map(|q| q.to_string()).collect();
            format!(
                "Kualitas saat ini: {}\nKetik salah satu: {}",
                job.options.quality,
                names.join(" / ").to_uppercase()
            )
        }
        Prompt::PaperMenu => {
            let names: Vec<String> = PaperSize::ALL.iter().map(|p| p.to_string()).collect();
            format!(
                "Ukuran kertas saat ini: {}\nKetik salah satu: {}",
                job.options.paper,
                names.join(" / ").to_uppercase()
            )
        }
        Prompt::InvalidConfirm => {
            "Balas YA untuk cetak, OPSI untuk ubah pengaturan, atau BATAL.".to_string()
        }
        Prompt::InvalidOption => format!("Pilihan tidak dikenal.\n\n{}", options_menu(job)),
        Prompt::InvalidCopies => format!("Jumlah copy harus angka 1-{max_copies}."),
    }
}

pub fn confirmation(job: &PrintJob) -> String {
    format!(
        "📄 {}\nHalaman: {} ({})\nCopy: {}\nKertas: {} | Kualitas: {} | Bolak-balik: {}\nEstimasi biaya: Rp{}\n\nBalas YA untuk cetak, OPSI untuk ubah pengaturan, BATAL untuk membatalkan.",
        job.file_name,
        job.pages,
        if job.has_color { "warna" } else { "hitam putih" },
        job.copies,
        job.options.paper,
        job.options.quality,
        if job.options.duplex { "ya" } else { "tidak" },
        job.estimated_cost,
    )
}

pub fn options_menu(job: &PrintJob) -> String {
    format!(
        "⚙️ Pengaturan\n1. Jumlah copy ({})\n2. Kualitas ({})\n3. Ukuran kertas ({})\n4. Bolak-balik ({})\n5. Selesai",
        job.copies,
        job.options.quality,
        job.options.paper,
        if job.options.duplex { "on" } else { "off" },
    )
}

pub fn printing(job: &PrintJob) -> String {
    format!("🖨️ Mencetak {} ({} copy)...", job.file_name, job.copies)
}

pub fn completed(job: &PrintJob) -> String {
    format!(
        "✅ Selesai: {} ({} halaman). Biaya: Rp{}",
        job.file_name,
        job.total_pages(),
        job.estimated_cost
    )
}

pub fn cancelled() -> String {
    "Dibatalkan. File sudah dihapus.".to_string()
}

pub fn no_session() -> String {
    "Kirim dokumen (PDF, Word, gambar, atau teks) untuk mulai mencetak. Ketik /help untuk bantuan."
        .to_string()
}

pub fn help(remaining: u32) -> String {
    format!(
        "Cara pakai:\n1. Kirim file yang ingin dicetak\n2. Balas YA untuk cetak, atau OPSI untuk ubah pengaturan\n/status - lihat job kamu\n\nSisa kuota jam ini: {remaining}"
    )
}

/// Reply text for an error recovered at the conversation boundary.
pub fn error(err: &PrintError) -> String {
    match err {
        PrintError::Validation(reason) => format!("❌ File ditolak: {reason}"),
        PrintError::RateLimited => {
            "⏳ Terlalu banyak permintaan. Coba lagi nanti.".to_string()
        }
        PrintError::NotFound(_) => {
            "❌ Sesi atau job tidak ditemukan (mungkin sudah kedaluwarsa). Kirim ulang file."
                .to_string()
        }
        PrintError::InvalidState { status, .. } => {
            format!("❌ Job sudah {status}, pengaturan tidak bisa diubah.")
        }
        PrintError::PrinterOffline => "❌ Printer sedang offline. Job dibatalkan.".to_string(),
        PrintError::PrintExecutionFailed { attempts } => {
            format!("❌ Gagal mencetak setelah {attempts} percobaan.")
        }
        _ => "❌ Terjadi kesalahan sistem. Silakan coba lagi.".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{FileAnalysis, StoredFile, Tariff};
    use chrono::Utc;
    use std::path::PathBuf;

    fn job() -> PrintJob {
        PrintJob::new(
            "a".into(),
            "c".into(),
            StoredFile {
                file_name: "laporan.pdf".into(),
                path: PathBuf::from("/tmp/laporan.pdf"),
                extension: "pdf".into(),
                size_bytes: 10,
            },
            FileAnalysis {
                pages: 3,
                has_color: false,
            },
            1,
            &Tariff::default(),
            Utc::now(),
        )
    }

    #[test]
    fn confirmation_shows_cost_and_pages() {
        let text = confirmation(&job());
        assert!(text.contains("laporan.pdf"));
        assert!(text.contains("Halaman: 3"));
        assert!(text.contains("Rp1500"));
    }

    #[test]
    fn menus_list_choices() {
        let job = job();
        assert!(render(Prompt::QualityMenu, &job, 10).contains("DRAFT / NORMAL / HIGH"));
        assert!(render(Prompt::PaperMenu, &job, 10).contains("A4 / A3 / LETTER"));
        assert!(render(Prompt::AskCopies, &job, 10).contains("1-10"));
    }

    #[test]
    fn error_texts_are_specific() {
        assert!(error(&PrintError::PrinterOffline).contains("offline"));
        assert!(error(&PrintError::PrintExecutionFailed { attempts: 3 }).contains('3'));
        assert!(error(&PrintError::System("boom".into())).contains("sistem"));
    }
}
