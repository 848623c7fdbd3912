//! Matter lifecycle gate.
//!
//! The only component that writes matter risk state. Handlers and workers
//! call through here for creation, document attachment, scans, approval and
//! export assembly.
//!
//! Scans of the same document are serialized: a second scan of a document
//! waits until the first has recorded its findings.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use tracing::{info, warn};

use domus_core::{Error, Result, ScanConfig};
use domus_extract::{is_pdf, DocumentType, ExtractedFields, TextExtractor, RULESET_VERSION};
use domus_risk::{aggregate, RiskBand, RiskCategory, RiskFinding};
use domus_store::{
    BlobStore, DocumentRecord, FindingRecord, Matter, MatterStatus, NewDocument, NewFinding,
    NewMatter, NewScan, PropertyUpdate, SqliteStore,
};

use crate::export::{ExportData, ExportOverrides};
use crate::metrics::{Counter, Metrics};
use crate::pipeline::{run_pipeline, DocumentSource};

const MAX_REF_ATTEMPTS: usize = 5;
pub const PDF_REQUIRED: &str = "PDF required";

/// Which document of a matter to scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanTarget {
    Document(i64),
    /// Most recently attached document.
    Latest,
}

/// An uploaded file on its way to becoming a document.
pub struct Upload<'a> {
    pub filename: &'a str,
    pub content_type: Option<&'a str>,
    pub kind: &'a str,
    pub bytes: &'a [u8],
}

/// Result of one scan, identical for inline and queued execution.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub matter_id: i64,
    pub document_id: i64,
    pub scan_id: i64,
    pub doc_type: DocumentType,
    pub ruleset_version: u32,
    pub ocr_applied: bool,
    pub overall_score: f64,
    pub band: RiskBand,
    pub findings: Vec<RiskFinding>,
    pub fields: ExtractedFields,
}

/// A matter with its documents, current findings and derived score.
#[derive(Debug, Clone)]
pub struct MatterDetail {
    pub matter: Matter,
    pub documents: Vec<DocumentRecord>,
    pub findings: Vec<FindingRecord>,
    pub risk_score: f64,
    pub risk_band: RiskBand,
}

pub struct MatterGate {
    store: Arc<SqliteStore>,
    blobs: Arc<dyn BlobStore>,
    extractor: Arc<dyn TextExtractor>,
    metrics: Arc<Metrics>,
    config: ScanConfig,
    in_flight: Mutex<HashSet<i64>>,
    released: Condvar,
}

/// Holds a document's in-flight marker; releases it on drop.
struct ScanSlot<'a> {
    gate: &'a MatterGate,
    document_id: i64,
}

impl Drop for ScanSlot<'_> {
    fn drop(&mut self) {
        self.gate.in_flight.lock().remove(&self.document_id);
        self.gate.released.notify_all();
    }
}

impl MatterGate {
    pub fn new(
        store: Arc<SqliteStore>,
        blobs: Arc<dyn BlobStore>,
        extractor: Arc<dyn TextExtractor>,
        metrics: Arc<Metrics>,
        config: ScanConfig,
    ) -> Self {
        Self {
            store,
            blobs,
            extractor,
            metrics,
            config,
            in_flight: Mutex::new(HashSet::new()),
            released: Condvar::new(),
        }
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.config.max_upload_bytes
    }

    // ---------------------------------------------------------------
    // Matters
    // ---------------------------------------------------------------

    /// Create a matter and return it. A client-supplied ref that already
    /// exists is a conflict; a synthesized ref that collides is regenerated.
    pub fn ingest(&self, reference: Option<&str>, council: Option<&str>) -> Result<Matter> {
        let council = council
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        let matter = match reference.map(str::trim).filter(|r| !r.is_empty()) {
            Some(reference) => self.store.create_matter(&NewMatter {
                reference: reference.to_string(),
                council,
            })?,
            None => self.create_with_generated_ref(council)?,
        };

        self.metrics.incr(Counter::MattersCreated);
        info!(matter_id = matter.id, reference = %matter.reference, "matter ingested");
        Ok(matter)
    }

    fn create_with_generated_ref(&self, council: Option<String>) -> Result<Matter> {
        let mut last_err = None;
        for _ in 0..MAX_REF_ATTEMPTS {
            let new = NewMatter {
                reference: generate_ref(),
                council: council.clone(),
            };
            match self.store.create_matter(&new) {
                Ok(matter) => return Ok(matter),
                Err(Error::Conflict(msg)) => {
                    warn!("generated matter ref collided, regenerating: {}", msg);
                    last_err = Some(Error::Conflict(msg));
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| Error::Conflict("could not allocate matter ref".into())))
    }

    pub fn get_matter(&self, matter_id: i64) -> Result<Matter> {
        self.store
            .get_matter(matter_id)?
            .ok_or_else(|| Error::NotFound(format!("matter {}", matter_id)))
    }

    pub fn list_matters(&self, limit: usize) -> Result<Vec<Matter>> {
        self.store.list_matters(limit)
    }

    pub fn update_property(&self, matter_id: i64, update: &PropertyUpdate) -> Result<Matter> {
        self.store
            .update_property(matter_id, update)?
            .ok_or_else(|| Error::NotFound(format!("matter {}", matter_id)))
    }

    /// `processing` → `approved`. Approving an approved matter is a no-op;
    /// a matter that was never successfully scanned cannot be approved.
    pub fn approve(&self, matter_id: i64) -> Result<Matter> {
        let matter = self.get_matter(matter_id)?;
        match matter.status {
            MatterStatus::Approved => Ok(matter),
            MatterStatus::Processing => {
                if !self.store.transition_status(
                    matter_id,
                    &[MatterStatus::Processing],
                    MatterStatus::Approved,
                )? {
                    return Err(Error::Conflict(format!(
                        "matter {} changed state during approval",
                        matter_id
                    )));
                }
                info!(matter_id, "matter approved");
                self.get_matter(matter_id)
            }
            MatterStatus::Received | MatterStatus::Failed => Err(Error::Validation(format!(
                "matter is {} and has no successful scan to approve",
                matter.status
            ))),
        }
    }

    pub fn matter_detail(&self, matter_id: i64) -> Result<MatterDetail> {
        let matter = self.get_matter(matter_id)?;
        let documents = self.store.list_documents(matter_id)?;
        let findings = self.store.current_findings(matter_id)?;
        let (risk_score, risk_band) = score_of(&findings);
        Ok(MatterDetail {
            matter,
            documents,
            findings,
            risk_score,
            risk_band,
        })
    }

    /// Gather export contents for a matter. Overrides apply only when the
    /// matter has no stored findings.
    pub fn build_export(&self, matter_id: i64, overrides: ExportOverrides) -> Result<ExportData> {
        let matter = self.get_matter(matter_id)?;
        let documents = self.store.list_documents(matter_id)?;
        let live = self.store.current_findings(matter_id)?;
        Ok(ExportData::assemble(matter, documents, &live, overrides))
    }

    // ---------------------------------------------------------------
    // Documents
    // ---------------------------------------------------------------

    pub fn attach_document(&self, matter_id: i64, upload: Upload<'_>) -> Result<DocumentRecord> {
        self.get_matter(matter_id)?;

        if upload.bytes.len() > self.config.max_upload_bytes {
            return Err(Error::PayloadTooLarge(format!(
                "upload of {} bytes exceeds limit of {}",
                upload.bytes.len(),
                self.config.max_upload_bytes
            )));
        }
        if !is_pdf(upload.bytes) {
            return Err(Error::Validation(PDF_REQUIRED.into()));
        }

        let kind = match upload.kind.trim() {
            "" => "search".to_string(),
            k => k.to_ascii_lowercase(),
        };
        let pointer = self.blobs.put(upload.filename, upload.bytes)?;
        let document = self.store.add_document(&NewDocument {
            matter_id,
            kind,
            filename: upload.filename.to_string(),
            content_type: upload.content_type.map(str::to_string),
            size_bytes: upload.bytes.len() as i64,
            storage_pointer: pointer,
        })?;

        self.metrics.incr(Counter::DocumentsUploaded);
        info!(
            matter_id,
            document_id = document.id,
            size = document.size_bytes,
            "document attached"
        );
        Ok(document)
    }

    // ---------------------------------------------------------------
    // Scans
    // ---------------------------------------------------------------

    /// Run the pipeline over one of the matter's documents and record the
    /// result. Blocking; callers on an async runtime use `spawn_blocking`.
    pub fn run_risk_scan(&self, matter_id: i64, target: ScanTarget) -> Result<ScanReport> {
        self.run_risk_scan_until(matter_id, target, &AtomicBool::new(false))
    }

    /// [`run_risk_scan`](Self::run_risk_scan) that gives up once `cancelled`
    /// is set. A cancelled scan records no findings and leaves the matter
    /// status alone; it returns [`Error::Timeout`].
    pub fn run_risk_scan_until(
        &self,
        matter_id: i64,
        target: ScanTarget,
        cancelled: &AtomicBool,
    ) -> Result<ScanReport> {
        self.get_matter(matter_id)?;
        let document = self.resolve_document(matter_id, target)?;

        let _slot = self.acquire(document.id);
        // Re-read under the slot so text cached by a previous scan is seen.
        let document = self
            .store
            .get_document(document.id)?
            .ok_or_else(|| Error::NotFound(format!("document {}", document.id)))?;

        match self.scan_document(&document, cancelled) {
            Ok(report) => {
                self.store.transition_status(
                    matter_id,
                    &[MatterStatus::Received, MatterStatus::Failed],
                    MatterStatus::Processing,
                )?;
                self.metrics.incr(Counter::ScansOk);
                info!(
                    matter_id,
                    document_id = document.id,
                    scan_id = report.scan_id,
                    findings = report.findings.len(),
                    score = report.overall_score,
                    "risk scan recorded"
                );
                Ok(report)
            }
            Err(e) if cancelled.load(Ordering::SeqCst) => {
                warn!(matter_id, document_id = document.id, "risk scan abandoned: {}", e);
                Err(e)
            }
            Err(e) => {
                self.metrics.incr(Counter::ScansFailed);
                if let Err(status_err) = self.store.transition_status(
                    matter_id,
                    &[MatterStatus::Received],
                    MatterStatus::Failed,
                ) {
                    warn!(matter_id, "could not mark matter failed: {}", status_err);
                }
                Err(e)
            }
        }
    }

    fn resolve_document(&self, matter_id: i64, target: ScanTarget) -> Result<DocumentRecord> {
        match target {
            ScanTarget::Document(document_id) => self
                .store
                .get_document(document_id)?
                .filter(|d| d.matter_id == matter_id)
                .ok_or_else(|| {
                    Error::NotFound(format!("document {} on matter {}", document_id, matter_id))
                }),
            ScanTarget::Latest => self.store.latest_document(matter_id)?.ok_or_else(|| {
                Error::Validation(format!("matter {} has no documents to scan", matter_id))
            }),
        }
    }

    fn scan_document(&self, document: &DocumentRecord, cancelled: &AtomicBool) -> Result<ScanReport> {
        let doc_type = DocumentType::from_kind(&document.kind);

        let output = match &document.ocr_text {
            Some(text) => run_pipeline(DocumentSource::Text(text), doc_type, self.extractor.as_ref()),
            None => {
                let bytes = self.blobs.get(&document.storage_pointer)?;
                let output =
                    run_pipeline(DocumentSource::Bytes(&bytes), doc_type, self.extractor.as_ref());
                self.store
                    .set_ocr_text(document.id, &output.text, output.ocr_applied)?;
                output
            }
        };

        let findings: Vec<NewFinding> = output
            .risk
            .findings
            .iter()
            .map(|f| NewFinding {
                category: f.category.as_str().to_string(),
                raw_value: f.raw_value.clone(),
                weight: f.weight,
                severity: f.severity.as_str().to_string(),
                snippet: f.snippet.clone(),
            })
            .collect();

        if cancelled.load(Ordering::SeqCst) {
            return Err(Error::Timeout(format!(
                "scan of document {} cancelled before recording",
                document.id
            )));
        }

        let recorded = self.store.record_scan(&NewScan {
            matter_id: document.matter_id,
            document_id: document.id,
            doc_type: doc_type.as_str().to_string(),
            ruleset_version: RULESET_VERSION,
            fields: serde_json::to_value(&output.fields)?,
            findings,
        })?;

        Ok(ScanReport {
            matter_id: document.matter_id,
            document_id: document.id,
            scan_id: recorded.scan.id,
            doc_type,
            ruleset_version: RULESET_VERSION,
            ocr_applied: output.ocr_applied || document.ocr_applied,
            overall_score: output.risk.overall_score,
            band: output.risk.band,
            findings: output.risk.findings,
            fields: output.fields,
        })
    }

    /// Block until no other scan of `document_id` is running, then claim it.
    fn acquire(&self, document_id: i64) -> ScanSlot<'_> {
        let mut in_flight = self.in_flight.lock();
        while in_flight.contains(&document_id) {
            self.released.wait(&mut in_flight);
        }
        in_flight.insert(document_id);
        ScanSlot {
            gate: self,
            document_id,
        }
    }
}

/// Score derived from stored findings; unknown category codes are ignored.
pub fn score_of(findings: &[FindingRecord]) -> (f64, RiskBand) {
    aggregate(
        findings
            .iter()
            .filter_map(|f| RiskCategory::parse(&f.category)),
    )
}

/// `DMS/<yyyymmdd>/<6 hex>`.
fn generate_ref() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string()[..6].to_uppercase();
    format!("DMS/{}/{}", chrono::Utc::now().format("%Y%m%d"), suffix)
}
