//! Weighted risk scoring.
//!
//! `overall_score = clamp(sum(weights) / SCORE_NORMALIZER, 0, 1)`.
//! Adding a finding can only raise the score, and no findings means 0.0.

use domus_extract::{ExtractedField, ExtractedFields, ExtractedValue, FieldName};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::taxonomy::{RiskCategory, Severity};

/// Sum of weights that maps to a score of 1.0.
pub const SCORE_NORMALIZER: f64 = 2.0;

/// One discrete risk signal derived from an extracted field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFinding {
    pub category: RiskCategory,
    pub raw_value: String,
    pub weight: f64,
    pub severity: Severity,
    pub snippet: String,
    pub source_field: FieldName,
}

/// Qualitative band for an overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskBand {
    Low,
    Moderate,
    Elevated,
    High,
}

impl RiskBand {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.75 {
            Self::High
        } else if score >= 0.5 {
            Self::Elevated
        } else if score >= 0.2 {
            Self::Moderate
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Moderate => "Moderate",
            Self::Elevated => "Elevated",
            Self::High => "High",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskResult {
    pub overall_score: f64,
    pub band: RiskBand,
    pub findings: Vec<RiskFinding>,
}

impl RiskResult {
    pub fn empty() -> Self {
        Self {
            overall_score: 0.0,
            band: RiskBand::Low,
            findings: Vec::new(),
        }
    }

    pub fn categories(&self) -> Vec<RiskCategory> {
        self.findings.iter().map(|f| f.category).collect()
    }
}

/// Score a field mapping. Findings keep the extractor's discovery order.
pub fn score(fields: &ExtractedFields) -> RiskResult {
    let findings: Vec<RiskFinding> = fields.iter().filter_map(finding_for).collect();
    let (overall_score, band) = aggregate(findings.iter().map(|f| f.category));
    debug!(findings = findings.len(), overall_score, "scored fields");
    RiskResult {
        overall_score,
        band,
        findings,
    }
}

/// Like [`score`], with findings ordered by descending severity then weight.
/// Ties keep discovery order.
pub fn score_sorted(fields: &ExtractedFields) -> RiskResult {
    let mut result = score(fields);
    result.findings.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then(b.weight.total_cmp(&a.weight))
    });
    result
}

/// Score and band for a set of categories. Used both for fresh scans and
/// for findings read back from storage, so the two can never disagree.
pub fn aggregate(categories: impl IntoIterator<Item = RiskCategory>) -> (f64, RiskBand) {
    let total: f64 = categories.into_iter().map(|c| c.weight()).sum();
    let overall = (total / SCORE_NORMALIZER).clamp(0.0, 1.0);
    (overall, RiskBand::from_score(overall))
}

fn finding_for(field: &ExtractedField) -> Option<RiskFinding> {
    let category = RiskCategory::from_field(field.name)?;
    if !raises(category, &field.value) {
        return None;
    }
    Some(RiskFinding {
        category,
        raw_value: field.value.display(),
        weight: category.weight(),
        severity: category.severity(),
        snippet: field.snippet.clone(),
        source_field: field.name,
    })
}

/// Whether a matched field carries the risk-bearing polarity.
fn raises(category: RiskCategory, value: &ExtractedValue) -> bool {
    match category {
        // Zone 1 is low probability and not a finding.
        RiskCategory::FloodZone => matches!(value, ExtractedValue::Level(n) if *n >= 2),
        RiskCategory::EnforcementNotice
        | RiskCategory::Cil
        | RiskCategory::Radon
        | RiskCategory::ContaminatedLand
        | RiskCategory::SmokeControl
        | RiskCategory::LightingConsent => !matches!(value, ExtractedValue::Flag(false)),
        // Risk lies in the negative answer: road not adopted, certificate missing.
        RiskCategory::HighwayAdoption | RiskCategory::BuildingRegs => {
            matches!(value, ExtractedValue::Flag(false))
        }
        RiskCategory::ConservationArea
        | RiskCategory::ListedBuilding
        | RiskCategory::TreePreservationOrder
        | RiskCategory::Section106
        | RiskCategory::Article4Direction => true,
    }
}
