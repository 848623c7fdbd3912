//! Canonical LLC1 register summary.
//!
//! Collapses findings onto the standard register headings. A heading with no
//! matching finding reads "No information held", which is not an
//! authoritative negative.

use serde::{Deserialize, Serialize};

use crate::taxonomy::RiskCategory;

pub const NO_INFORMATION: &str = "No information held";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Llc1Heading {
    ConservationArea,
    ListedBuilding,
    TreePreservationOrder,
    #[serde(rename = "ARTICLE_4_DIRECTION")]
    Article4Direction,
    EnforcementNotice,
    FinancialCharges,
    SmokeControl,
    LightingConsent,
}

impl Llc1Heading {
    pub const ALL: [Llc1Heading; 8] = [
        Self::ConservationArea,
        Self::ListedBuilding,
        Self::TreePreservationOrder,
        Self::Article4Direction,
        Self::EnforcementNotice,
        Self::FinancialCharges,
        Self::SmokeControl,
        Self::LightingConsent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ConservationArea => "CONSERVATION_AREA",
            Self::ListedBuilding => "LISTED_BUILDING",
            Self::TreePreservationOrder => "TREE_PRESERVATION_ORDER",
            Self::Article4Direction => "ARTICLE_4_DIRECTION",
            Self::EnforcementNotice => "ENFORCEMENT_NOTICE",
            Self::FinancialCharges => "FINANCIAL_CHARGES",
            Self::SmokeControl => "SMOKE_CONTROL",
            Self::LightingConsent => "LIGHTING_CONSENT",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::ConservationArea => "Conservation area",
            Self::ListedBuilding => "Listed building",
            Self::TreePreservationOrder => "Tree preservation order",
            Self::Article4Direction => "Article 4 direction",
            Self::EnforcementNotice => "Enforcement notice",
            Self::FinancialCharges => "Financial charges",
            Self::SmokeControl => "Smoke control",
            Self::LightingConsent => "Lighting consent",
        }
    }

    fn categories(&self) -> &'static [RiskCategory] {
        match self {
            Self::ConservationArea => &[RiskCategory::ConservationArea],
            Self::ListedBuilding => &[RiskCategory::ListedBuilding],
            Self::TreePreservationOrder => &[RiskCategory::TreePreservationOrder],
            Self::Article4Direction => &[RiskCategory::Article4Direction],
            Self::EnforcementNotice => &[RiskCategory::EnforcementNotice],
            Self::FinancialCharges => &[RiskCategory::Section106, RiskCategory::Cil],
            Self::SmokeControl => &[RiskCategory::SmokeControl],
            Self::LightingConsent => &[RiskCategory::LightingConsent],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Llc1Entry {
    pub heading: Llc1Heading,
    pub answer: String,
}

/// Summarise `(category, raw_value)` pairs under each LLC1 heading, in
/// heading order. The first finding for a heading wins.
pub fn map_llc1<'a>(findings: impl IntoIterator<Item = (RiskCategory, &'a str)>) -> Vec<Llc1Entry> {
    let findings: Vec<(RiskCategory, &str)> = findings.into_iter().collect();

    Llc1Heading::ALL
        .iter()
        .map(|heading| {
            let answer = findings
                .iter()
                .find(|(category, _)| heading.categories().contains(category))
                .map(|(_, raw)| yes_answer(raw))
                .unwrap_or_else(|| NO_INFORMATION.to_string());
            Llc1Entry {
                heading: *heading,
                answer,
            }
        })
        .collect()
}

fn yes_answer(raw: &str) -> String {
    let raw = raw.trim();
    match raw.to_ascii_lowercase().as_str() {
        "" | "present" | "yes" => "Yes".to_string(),
        _ => format!("Yes: {}", raw),
    }
}
