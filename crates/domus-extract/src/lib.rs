//! Domus Extract: OCR/PDF text, normalization, LLC1/CON29 field extraction.

pub mod fields;
pub mod normalize;
pub mod text;

pub use fields::{
    extract, extract_raw, DocumentType, ExtractedField, ExtractedFields, ExtractedValue, FieldName,
    RULESET_VERSION,
};
pub use normalize::{normalize, NormalizedText};
pub use text::{is_pdf, PdfTextExtractor, TextExtraction, TextExtractor};
