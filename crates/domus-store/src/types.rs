//! Row types for matters, documents, scans and findings.

use serde::{Deserialize, Serialize};

/// Matter lifecycle: `received` → `processing` → `approved`, or `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatterStatus {
    Received,
    Processing,
    Approved,
    Failed,
}

impl MatterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Processing => "processing",
            Self::Approved => "approved",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "received" => Some(Self::Received),
            "processing" => Some(Self::Processing),
            "approved" => Some(Self::Approved),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for MatterStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured property reference on a matter. All parts optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub uprn: Option<String>,
    pub title_number: Option<String>,
    pub address_text: Option<String>,
    pub postcode: Option<String>,
}

impl Property {
    pub fn is_empty(&self) -> bool {
        self.uprn.is_none()
            && self.title_number.is_none()
            && self.address_text.is_none()
            && self.postcode.is_none()
    }
}

/// A matter row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matter {
    pub id: i64,
    #[serde(rename = "ref")]
    pub reference: String,
    pub council: Option<String>,
    pub property: Property,
    pub status: MatterStatus,
    pub created_at: i64,
    pub approved_at: Option<i64>,
    pub first_scan_at: Option<i64>,
}

/// Input for [`crate::SqliteStore::create_matter`].
#[derive(Debug, Clone, Default)]
pub struct NewMatter {
    pub reference: String,
    pub council: Option<String>,
}

/// Partial property update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PropertyUpdate {
    pub uprn: Option<String>,
    #[serde(alias = "title_no")]
    pub title_number: Option<String>,
    pub address_text: Option<String>,
    pub postcode: Option<String>,
}

/// An uploaded document row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: i64,
    pub matter_id: i64,
    pub kind: String,
    pub filename: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub size_bytes: i64,
    pub storage_pointer: String,
    /// Set once, when text is first extracted.
    #[serde(skip_serializing)]
    pub ocr_text: Option<String>,
    pub ocr_applied: bool,
    pub created_at: i64,
}

/// Input for [`crate::SqliteStore::add_document`].
#[derive(Debug, Clone, Default)]
pub struct NewDocument {
    pub matter_id: i64,
    pub kind: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub size_bytes: i64,
    pub storage_pointer: String,
}

/// One extraction run over a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    pub id: i64,
    pub matter_id: i64,
    pub document_id: i64,
    pub doc_type: String,
    pub ruleset_version: u32,
    pub fields: serde_json::Value,
    pub created_at: i64,
}

/// A persisted risk finding. `category` is a taxonomy code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingRecord {
    pub id: i64,
    pub scan_id: i64,
    pub matter_id: i64,
    pub document_id: i64,
    pub category: String,
    pub raw_value: String,
    pub weight: f64,
    pub severity: String,
    pub snippet: String,
    pub position: i64,
    pub created_at: i64,
}

#[derive(Debug, Clone, Default)]
pub struct NewFinding {
    pub category: String,
    pub raw_value: String,
    pub weight: f64,
    pub severity: String,
    pub snippet: String,
}

/// Input for [`crate::SqliteStore::record_scan`]. Findings are stored in
/// the given order.
#[derive(Debug, Clone, Default)]
pub struct NewScan {
    pub matter_id: i64,
    pub document_id: i64,
    pub doc_type: String,
    pub ruleset_version: u32,
    pub fields: serde_json::Value,
    pub findings: Vec<NewFinding>,
}

/// Result of recording a scan.
#[derive(Debug, Clone)]
pub struct RecordedScan {
    pub scan: ScanRecord,
    pub findings: Vec<FindingRecord>,
}
