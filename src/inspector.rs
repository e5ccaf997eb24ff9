//! File inspection: page count and color detection for stored uploads.
//!
//! [`BasicInspector`] uses cheap structural heuristics rather than a full
//! renderer. PDFs are scanned for page objects and color spaces, PNG headers
//! reveal grayscale images, and plain text is paginated by line count.

use std::future::Future;
use std::path::Path;

use crate::error::PrintError;
use crate::job::FileAnalysis;

/// Lines per printed page of plain text.
const TEXT_LINES_PER_PAGE: usize = 60;

/// Rough size of one page of a Word document.
const DOC_BYTES_PER_PAGE: u64 = 25 * 1024;

pub trait FileInspector: Send + Sync + 'static {
    fn analyze(
        &self,
        path: &Path,
        extension: &str,
    ) -> impl Future<Output = Result<FileAnalysis, PrintError>> + Send;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct BasicInspector;

impl FileInspector for BasicInspector {
    async fn analyze(&self, path: &Path, extension: &str) -> Result<FileAnalysis, PrintError> {
        let bytes = tokio::fs::read(path).await?;
        if bytes.is_empty() {
            return Err(PrintError::Validation("file is empty".into()));
        }
        match extension.to_ascii_lowercase().as_str() {
            "pdf" => analyze_pdf(&bytes),
            "txt" => Ok(analyze_text(&bytes)),
            "png" => analyze_png(&bytes),
            "jpg" | "jpeg" => {
                if !bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
                    return Err(PrintError::Validation("not a JPEG image".into()));
                }
                Ok(FileAnalysis {
                    pages: 1,
                    has_color: true,
                })
            }
            "doc" | "docx" => Ok(FileAnalysis {
                pages: (bytes.len() as u64).div_ceil(DOC_BYTES_PER_PAGE).max(1) as u32,
                has_color: false,
            }),
            other => Err(PrintError::Validation(format!(
                "cannot inspect .{other} files"
            ))),
        }
    }
}

fn analyze_pdf(bytes: &[u8]) -> Result<FileAnalysis, PrintError> {
    if !bytes.starts_with(b"%PDF") {
        return Err(PrintError::Validation("not a PDF document".into()));
    }
    let pages = count_pdf_pages(bytes);
    let has_color = [&b"/DeviceRGB"[..], b"/DeviceCMYK", b"/ICCBased", b"/CalRGB"]
        .iter()
        .any(|needle| contains(bytes, needle));
    Ok(FileAnalysis {
        pages: pages.max(1),
        has_color,
    })
}

/// Counts `/Type /Page` dictionaries, skipping the `/Pages` tree nodes.
fn count_pdf_pages(bytes: &[u8]) -> u32 {
    let mut count = 0;
    let mut i = 0;
    while let Some(pos) = find(&bytes[i..], b"/Type") {
        let mut j = i + pos + b"/Type".len();
        while j < bytes.len() && bytes[j].is_ascii_whitespace() {
            j += 1;
        }
        if bytes[j..].starts_with(b"/Page") {
            let after = j + b"/Page".len();
            if bytes.get(after) != Some(&b's') {
                count += 1;
            }
        }
        i = j;
    }
    count
}

fn analyze_text(bytes: &[u8]) -> FileAnalysis {
    let lines = String::from_utf8_lossy(bytes).lines().count().max(1);
    FileAnalysis {
        pages: lines.div_ceil(TEXT_LINES_PER_PAGE) as u32,
        has_color: false,
    }
}

fn analyze_png(bytes: &[u8]) -> Result<FileAnalysis, PrintError> {
    const SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    if !bytes.starts_with(SIGNATURE) || bytes.len() < 26 {
        return Err(PrintError::Validation("not a PNG image".into()));
    }
    // IHDR color type: 0 = grayscale, 4 = grayscale + alpha.
    let color_type = bytes[25];
    Ok(FileAnalysis {
        pages: 1,
        has_color: !matches!(color_type, 0 | 4),
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    find(haystack, needle).is_some()
}
