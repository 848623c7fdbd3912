//! Matter exports: a JSON document and a minimal Word report.
//!
//! Both builders are pure functions of [`ExportData`]. Nothing time-dependent
//! is generated here, so exporting the same matter twice with no scan in
//! between yields identical bytes.

use std::io::{Cursor, Write};

use serde::{Deserialize, Serialize};
use serde_json::json;

use domus_core::{millis_to_rfc3339, Error, Result};
use domus_risk::{aggregate, map_llc1, Llc1Entry, RiskBand, RiskCategory};
use domus_store::{DocumentRecord, FindingRecord, Matter};

pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// A finding as it appears in an export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportFinding {
    pub category: String,
    pub raw_value: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub snippet: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<i64>,
}

impl From<&FindingRecord> for ExportFinding {
    fn from(f: &FindingRecord) -> Self {
        Self {
            category: f.category.clone(),
            raw_value: f.raw_value.clone(),
            severity: f.severity.clone(),
            weight: f.weight,
            snippet: f.snippet.clone(),
            document_id: Some(f.document_id),
        }
    }
}

/// Caller-supplied fallbacks, used only when the matter has no stored
/// findings. Both default to empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportOverrides {
    #[serde(default)]
    pub findings: Vec<ExportFinding>,
    #[serde(default)]
    pub risks: Vec<RiskCategory>,
}

/// Everything an export needs, resolved from storage.
#[derive(Debug, Clone)]
pub struct ExportData {
    pub matter: Matter,
    pub documents: Vec<DocumentRecord>,
    pub findings: Vec<ExportFinding>,
    pub risks: Vec<RiskCategory>,
    pub overall_score: f64,
    pub band: RiskBand,
    pub llc1: Vec<Llc1Entry>,
}

impl ExportData {
    /// Resolve export contents: live findings first, overrides only when
    /// there are none and the override is non-empty.
    pub fn assemble(
        matter: Matter,
        documents: Vec<DocumentRecord>,
        live: &[FindingRecord],
        overrides: ExportOverrides,
    ) -> Self {
        let findings: Vec<ExportFinding> = if live.is_empty() && !overrides.findings.is_empty() {
            overrides.findings
        } else {
            live.iter().map(ExportFinding::from).collect()
        };

        let mut risks: Vec<RiskCategory> = Vec::new();
        for category in findings.iter().filter_map(|f| RiskCategory::parse(&f.category)) {
            if !risks.contains(&category) {
                risks.push(category);
            }
        }
        if risks.is_empty() {
            for category in overrides.risks {
                if !risks.contains(&category) {
                    risks.push(category);
                }
            }
        }

        let (overall_score, band) = aggregate(risks.iter().copied());

        // Findings carry values; risks without a finding still answer "Yes".
        let pairs = findings
            .iter()
            .filter_map(|f| RiskCategory::parse(&f.category).map(|c| (c, f.raw_value.as_str())))
            .chain(risks.iter().map(|c| (*c, "")));
        let llc1 = map_llc1(pairs);

        Self {
            matter,
            documents,
            findings,
            risks,
            overall_score,
            band,
            llc1,
        }
    }
}

/// JSON export body.
pub fn build_json(data: &ExportData) -> serde_json::Value {
    let llc1: serde_json::Map<String, serde_json::Value> = data
        .llc1
        .iter()
        .map(|e| (e.heading.as_str().to_string(), json!(e.answer)))
        .collect();

    json!({
        "matter": {
            "id": data.matter.id,
            "ref": data.matter.reference,
            "council": data.matter.council,
            "status": data.matter.status,
            "property": data.matter.property,
            "created_at": millis_to_rfc3339(data.matter.created_at),
            "approved_at": data.matter.approved_at.map(millis_to_rfc3339),
        },
        "documents": data.documents.iter().map(|d| json!({
            "id": d.id,
            "kind": d.kind,
            "filename": d.filename,
        })).collect::<Vec<_>>(),
        "findings": data.findings,
        "risks": data.risks,
        "risk_score": data.overall_score,
        "risk_band": data.band.as_str(),
        "llc1": llc1,
    })
}

/// Minimal WordprocessingML package. Entries are stored uncompressed with a
/// fixed timestamp.
pub fn build_docx(data: &ExportData) -> Result<Vec<u8>> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored)
        .last_modified_time(zip::DateTime::default());

    let parts: [(&str, String); 3] = [
        ("[Content_Types].xml", CONTENT_TYPES_XML.to_string()),
        ("_rels/.rels", RELS_XML.to_string()),
        ("word/document.xml", document_xml(data)),
    ];
    for (name, body) in parts {
        zip.start_file(name, options)
            .map_err(|e| Error::Internal(format!("docx: {}", e)))?;
        zip.write_all(body.as_bytes())?;
    }

    let cursor = zip
        .finish()
        .map_err(|e| Error::Internal(format!("docx: {}", e)))?;
    Ok(cursor.into_inner())
}

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#;

const RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

fn document_xml(data: &ExportData) -> String {
    let matter = &data.matter;
    let mut lines: Vec<String> = vec![
        format!("Search report {}", matter.reference),
        format!("Council: {}", matter.council.as_deref().unwrap_or("Unknown")),
        format!("Status: {}", matter.status),
    ];
    if let Some(address) = &matter.property.address_text {
        lines.push(format!("Property: {}", address));
    }
    lines.push(format!(
        "Overall risk: {} ({:.2})",
        data.band.as_str(),
        data.overall_score
    ));

    lines.push("Findings".to_string());
    if data.findings.is_empty() {
        lines.push("No risk findings recorded.".to_string());
    } else {
        for f in &data.findings {
            lines.push(format!("{}: {} [{}]", f.category, f.raw_value, f.severity));
        }
    }

    lines.push("LLC1 summary".to_string());
    for entry in &data.llc1 {
        lines.push(format!("{}: {}", entry.heading.label(), entry.answer));
    }

    let paragraphs: String = lines
        .iter()
        .map(|line| format!(r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#, xml_escape(line)))
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        paragraphs
    )
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if (c as u32) < 0x20 && c != '\t' && c != '\n' && c != '\r' => {}
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use domus_store::{MatterStatus, Property};
    use std::io::Read;

    fn matter() -> Matter {
        Matter {
            id: 7,
            reference: "DMS/20260101/ABCDEF".into(),
            council: Some("Hertfordshire & Ware".into()),
            property: Property::default(),
            status: MatterStatus::Received,
            created_at: 1_767_225_600_000,
            approved_at: None,
            first_scan_at: None,
        }
    }

    fn stored(category: &str, raw: &str) -> FindingRecord {
        FindingRecord {
            id: 1,
            scan_id: 1,
            matter_id: 7,
            document_id: 3,
            category: category.into(),
            raw_value: raw.into(),
            weight: RiskCategory::parse(category).map(|c| c.weight()).unwrap_or(0.0),
            severity: "high".into(),
            snippet: String::new(),
            position: 0,
            created_at: 0,
        }
    }

    #[test]
    fn test_empty_matter_exports() {
        let data = ExportData::assemble(matter(), vec![], &[], ExportOverrides::default());
        let json = build_json(&data);
        assert_eq!(json["matter"]["ref"], "DMS/20260101/ABCDEF");
        assert_eq!(json["findings"].as_array().unwrap().len(), 0);
        assert_eq!(json["risk_score"], 0.0);
        assert_eq!(json["llc1"]["CONSERVATION_AREA"], "No information held");

        let docx = build_docx(&data).unwrap();
        assert!(docx.starts_with(b"PK"));
    }

    #[test]
    fn test_exports_are_deterministic() {
        let live = [stored("FLOOD_ZONE", "3")];
        let a = ExportData::assemble(matter(), vec![], &live, ExportOverrides::default());
        let b = ExportData::assemble(matter(), vec![], &live, ExportOverrides::default());
        assert_eq!(build_json(&a), build_json(&b));
        assert_eq!(build_docx(&a).unwrap(), build_docx(&b).unwrap());
    }

    #[test]
    fn test_live_findings_beat_overrides() {
        let overrides = ExportOverrides {
            findings: vec![ExportFinding {
                category: "RADON".into(),
                raw_value: "yes".into(),
                severity: "medium".into(),
                weight: 0.25,
                snippet: String::new(),
                document_id: None,
            }],
            risks: vec![RiskCategory::Radon],
        };
        let live = [stored("LISTED_BUILDING", "Grade II")];
        let data = ExportData::assemble(matter(), vec![], &live, overrides.clone());
        assert_eq!(data.risks, vec![RiskCategory::ListedBuilding]);

        let fallback = ExportData::assemble(matter(), vec![], &[], overrides);
        assert_eq!(fallback.risks, vec![RiskCategory::Radon]);
        assert_eq!(fallback.findings.len(), 1);
    }

    #[test]
    fn test_risk_only_override_answers_yes() {
        let overrides = ExportOverrides {
            findings: vec![],
            risks: vec![RiskCategory::TreePreservationOrder],
        };
        let data = ExportData::assemble(matter(), vec![], &[], overrides);
        let json = build_json(&data);
        assert_eq!(json["llc1"]["TREE_PRESERVATION_ORDER"], "Yes");
        assert_eq!(json["llc1"]["SMOKE_CONTROL"], "No information held");
        assert_eq!(json["llc1"]["LIGHTING_CONSENT"], "No information held");
    }

    #[test]
    fn test_docx_escapes_text() {
        let data = ExportData::assemble(matter(), vec![], &[], ExportOverrides::default());
        let docx = build_docx(&data).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(docx)).unwrap();
        let mut xml = String::new();
        archive
            .by_name("word/document.xml")
            .unwrap()
            .read_to_string(&mut xml)
            .unwrap();
        assert!(xml.contains("Hertfordshire &amp; Ware"));
        assert!(xml.contains("No risk findings recorded."));
    }
}
