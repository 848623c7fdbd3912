//! Fixed risk taxonomy and its weight table.

use domus_extract::FieldName;
use serde::{Deserialize, Serialize};

/// Every category a finding may carry. Closed set; weights are looked up,
/// never computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskCategory {
    #[serde(rename = "FLOOD_ZONE")]
    FloodZone,
    #[serde(rename = "CONSERVATION_AREA")]
    ConservationArea,
    #[serde(rename = "ENFORCEMENT_NOTICE")]
    EnforcementNotice,
    #[serde(rename = "LISTED_BUILDING")]
    ListedBuilding,
    #[serde(rename = "HIGHWAY_ADOPTION")]
    HighwayAdoption,
    #[serde(rename = "TREE_PRESERVATION_ORDER")]
    TreePreservationOrder,
    #[serde(rename = "SECTION_106")]
    Section106,
    #[serde(rename = "CIL")]
    Cil,
    #[serde(rename = "RADON")]
    Radon,
    #[serde(rename = "BUILDING_REGS")]
    BuildingRegs,
    #[serde(rename = "CONTAMINATED_LAND")]
    ContaminatedLand,
    #[serde(rename = "ARTICLE_4_DIRECTION")]
    Article4Direction,
    #[serde(rename = "SMOKE_CONTROL")]
    SmokeControl,
    #[serde(rename = "LIGHTING_CONSENT")]
    LightingConsent,
}

/// Coarse severity bucket shown next to a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl RiskCategory {
    pub const ALL: [RiskCategory; 14] = [
        Self::FloodZone,
        Self::ConservationArea,
        Self::EnforcementNotice,
        Self::ListedBuilding,
        Self::HighwayAdoption,
        Self::TreePreservationOrder,
        Self::Section106,
        Self::Cil,
        Self::Radon,
        Self::BuildingRegs,
        Self::ContaminatedLand,
        Self::Article4Direction,
        Self::SmokeControl,
        Self::LightingConsent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FloodZone => "FLOOD_ZONE",
            Self::ConservationArea => "CONSERVATION_AREA",
            Self::EnforcementNotice => "ENFORCEMENT_NOTICE",
            Self::ListedBuilding => "LISTED_BUILDING",
            Self::HighwayAdoption => "HIGHWAY_ADOPTION",
            Self::TreePreservationOrder => "TREE_PRESERVATION_ORDER",
            Self::Section106 => "SECTION_106",
            Self::Cil => "CIL",
            Self::Radon => "RADON",
            Self::BuildingRegs => "BUILDING_REGS",
            Self::ContaminatedLand => "CONTAMINATED_LAND",
            Self::Article4Direction => "ARTICLE_4_DIRECTION",
            Self::SmokeControl => "SMOKE_CONTROL",
            Self::LightingConsent => "LIGHTING_CONSENT",
        }
    }

    /// Parse a stored category code. Unknown codes are rejected so that a
    /// finding can never leave the taxonomy.
    pub fn parse(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.as_str() == code)
    }

    /// Fixed severity weight. All weights are positive.
    pub fn weight(&self) -> f64 {
        match self {
            Self::FloodZone | Self::EnforcementNotice => 0.6,
            Self::HighwayAdoption => 0.5,
            Self::ListedBuilding | Self::ContaminatedLand => 0.3,
            Self::Radon | Self::BuildingRegs => 0.25,
            Self::ConservationArea | Self::Section106 | Self::Cil => 0.2,
            Self::TreePreservationOrder | Self::Article4Direction => 0.15,
            Self::SmokeControl | Self::LightingConsent => 0.05,
        }
    }

    pub fn severity(&self) -> Severity {
        let w = self.weight();
        if w >= 0.5 {
            Severity::High
        } else if w >= 0.2 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    /// Category a risk-bearing field scores under. Informational fields
    /// (council, address, references) have none.
    pub fn from_field(field: FieldName) -> Option<Self> {
        Some(match field {
            FieldName::FloodZone => Self::FloodZone,
            FieldName::ConservationArea => Self::ConservationArea,
            FieldName::ListedBuilding => Self::ListedBuilding,
            FieldName::TreePreservationOrder => Self::TreePreservationOrder,
            FieldName::Article4Direction => Self::Article4Direction,
            FieldName::Section106 => Self::Section106,
            FieldName::Cil => Self::Cil,
            FieldName::EnforcementNotice => Self::EnforcementNotice,
            FieldName::HighwayAdoption => Self::HighwayAdoption,
            FieldName::Radon => Self::Radon,
            FieldName::BuildingRegs => Self::BuildingRegs,
            FieldName::ContaminatedLand => Self::ContaminatedLand,
            FieldName::SmokeControl => Self::SmokeControl,
            FieldName::LightingConsent => Self::LightingConsent,
            FieldName::Council
            | FieldName::PropertyAddress
            | FieldName::Postcode
            | FieldName::Uprn
            | FieldName::TitleNumber
            | FieldName::PlanningReferences => return None,
        })
    }
}

impl std::fmt::Display for RiskCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
