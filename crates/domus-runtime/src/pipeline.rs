//! The scan pipeline: text extraction → normalize → extract → score.
//!
//! Inline scans and queued jobs both call [`run_pipeline`]; nothing here
//! touches storage.

use domus_extract::{extract, DocumentType, ExtractedFields, NormalizedText, TextExtractor};
use domus_risk::{score, RiskResult};
use tracing::debug;

/// Where the pipeline gets its text from.
pub enum DocumentSource<'a> {
    /// Text already extracted on an earlier scan.
    Text(&'a str),
    /// Raw document bytes.
    Bytes(&'a [u8]),
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Raw extracted text, before normalization.
    pub text: String,
    pub ocr_applied: bool,
    pub doc_type: DocumentType,
    pub fields: ExtractedFields,
    pub risk: RiskResult,
}

pub fn run_pipeline(
    source: DocumentSource<'_>,
    doc_type: DocumentType,
    extractor: &dyn TextExtractor,
) -> PipelineOutput {
    let (text, ocr_applied) = match source {
        DocumentSource::Text(text) => (text.to_string(), false),
        DocumentSource::Bytes(bytes) => {
            let extraction = extractor.extract_text(bytes);
            (extraction.text, extraction.ocr_applied)
        }
    };

    let normalized = NormalizedText::new(Some(&text));
    let fields = extract(&normalized, doc_type);
    let risk = score(&fields);

    debug!(
        doc_type = %doc_type,
        chars = normalized.text.len(),
        fields = fields.len(),
        findings = risk.findings.len(),
        "pipeline complete"
    );

    PipelineOutput {
        text,
        ocr_applied,
        doc_type,
        fields,
        risk,
    }
}
