//! Raw text from uploaded documents.
//!
//! Native PDF text first; when that yields too little and an external OCR
//! command is configured, the document is OCR'd into a temporary file and
//! the text layer of the result is read instead. Non-PDF payloads are read
//! as (lossy) UTF-8 so plain-text fixtures can go through the same path.

use std::path::Path;
use std::process::{Command, Stdio};

use domus_core::ScanConfig;
use tracing::{debug, warn};

const PDF_MAGIC: &[u8] = b"%PDF";

/// Text pulled out of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextExtraction {
    pub text: String,
    /// True when the text came from the OCR fallback.
    pub ocr_applied: bool,
}

/// Turns document bytes into raw text. Never fails; unreadable input
/// yields empty text.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, bytes: &[u8]) -> TextExtraction;
}

/// Whether `bytes` start with the PDF signature.
pub fn is_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(PDF_MAGIC)
}

/// pdf-extract backed extractor with optional OCR fallback.
#[derive(Debug, Clone, Default)]
pub struct PdfTextExtractor {
    config: ScanConfig,
}

impl PdfTextExtractor {
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    fn ocr_command(&self) -> Option<&str> {
        if !self.config.ocr_enabled {
            return None;
        }
        self.config.ocr_command.as_deref()
    }

    /// Run `<cmd> --quiet --force-ocr <in> <out>` and read the text layer of
    /// the output. Returns `None` on any failure.
    fn ocr(&self, command: &str, bytes: &[u8]) -> Option<String> {
        let dir = tempfile::tempdir()
            .map_err(|e| warn!("OCR temp dir failed: {}", e))
            .ok()?;
        let input = dir.path().join("input.pdf");
        let output = dir.path().join("output.pdf");
        std::fs::write(&input, bytes)
            .map_err(|e| warn!("OCR input write failed: {}", e))
            .ok()?;

        run_ocr(command, &input, &output)?;

        let ocr_bytes = std::fs::read(&output)
            .map_err(|e| warn!("OCR output unreadable: {}", e))
            .ok()?;
        Some(native_pdf_text(&ocr_bytes))
    }
}

impl TextExtractor for PdfTextExtractor {
    fn extract_text(&self, bytes: &[u8]) -> TextExtraction {
        if !is_pdf(bytes) {
            return TextExtraction {
                text: String::from_utf8_lossy(bytes).into_owned(),
                ocr_applied: false,
            };
        }

        let native = native_pdf_text(bytes);
        let native_len = native.trim().chars().count();
        if native_len >= self.config.ocr_min_chars {
            return TextExtraction { text: native, ocr_applied: false };
        }

        let Some(command) = self.ocr_command() else {
            return TextExtraction { text: native, ocr_applied: false };
        };

        debug!(native_len, "native PDF text below threshold, trying OCR");
        match self.ocr(command, bytes) {
            Some(ocr_text) if ocr_text.trim().chars().count() > native_len => TextExtraction {
                text: ocr_text,
                ocr_applied: true,
            },
            _ => TextExtraction { text: native, ocr_applied: false },
        }
    }
}

/// Native text layer. pdf-extract may panic on malformed input, so the call
/// is isolated and any failure becomes empty text.
fn native_pdf_text(bytes: &[u8]) -> String {
    match std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            debug!("PDF text extraction failed: {}", e);
            String::new()
        }
        Err(_) => {
            warn!("PDF text extraction panicked on malformed input");
            String::new()
        }
    }
}

fn run_ocr(command: &str, input: &Path, output: &Path) -> Option<()> {
    let status = Command::new(command)
        .arg("--quiet")
        .arg("--force-ocr")
        .arg(input)
        .arg(output)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match status {
        Ok(s) if s.success() => Some(()),
        Ok(s) => {
            warn!(command, code = ?s.code(), "OCR command failed");
            None
        }
        Err(e) => {
            warn!(command, "OCR command could not start: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_passthrough() {
        let extractor = PdfTextExtractor::default();
        let out = extractor.extract_text(b"Flood Zone 3");
        assert_eq!(out.text, "Flood Zone 3");
        assert!(!out.ocr_applied);
    }

    #[test]
    fn test_malformed_pdf_yields_empty_text() {
        let extractor = PdfTextExtractor::default();
        let out = extractor.extract_text(b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\n%%EOF\n");
        assert!(out.text.trim().is_empty());
        assert!(!out.ocr_applied);
    }

    #[test]
    fn test_missing_ocr_binary_falls_back_to_native() {
        let extractor = PdfTextExtractor::new(ScanConfig {
            ocr_command: Some("domus-ocr-binary-that-does-not-exist".into()),
            ..ScanConfig::default()
        });
        let out = extractor.extract_text(b"%PDF-1.4\n%%EOF\n");
        assert!(!out.ocr_applied);
    }

    #[test]
    fn test_ocr_disabled_ignores_command() {
        let extractor = PdfTextExtractor::new(ScanConfig {
            ocr_enabled: false,
            ocr_command: Some("ocrmypdf".into()),
            ..ScanConfig::default()
        });
        assert!(extractor.ocr_command().is_none());
    }

    #[test]
    fn test_pdf_signature() {
        assert!(is_pdf(b"%PDF-1.7 ..."));
        assert!(!is_pdf(b"PK\x03\x04"));
        assert!(!is_pdf(b""));
    }
}
