//! LLC1 / CON29 field extraction.
//!
//! A fixed, versioned table of field rules runs over normalized text. Each
//! rule is keyword or regex based and independent of the others; all
//! applicable rules are evaluated in one pass and every hit is collected.
//! A field that does not match is simply absent from the result.
//!
//! Matching is keyword presence, not semantics: "not within a Conservation
//! Area" still yields `conservation_area`. Rules with an explicit yes/no
//! answer after the keyword (enforcement notices, CIL, radon, ...) record
//! that answer as a [`ExtractedValue::Flag`] and leave interpretation to the
//! scorer.

use std::ops::Range;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::normalize::NormalizedText;

/// Bumped whenever a rule is added, removed or its pattern changes.
pub const RULESET_VERSION: u32 = 2;

const SNIPPET_MAX_CHARS: usize = 200;
const TEXT_VALUE_MAX_CHARS: usize = 120;

/// Local-authority search document type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DocumentType {
    /// Local Land Charges register search.
    Llc1,
    /// Enquiries of the local authority.
    Con29,
    /// Combined search pack containing both parts.
    Search,
}

impl DocumentType {
    /// Map a Document `kind` to the rule set it should be scanned with.
    /// Unrecognised kinds are treated as a combined search.
    pub fn from_kind(kind: &str) -> Self {
        match kind.trim().to_ascii_lowercase().as_str() {
            "llc1" => Self::Llc1,
            "con29" | "con29r" | "con29o" => Self::Con29,
            _ => Self::Search,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Llc1 => "LLC1",
            Self::Con29 => "CON29",
            Self::Search => "SEARCH",
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every field the extractor knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    FloodZone,
    ConservationArea,
    ListedBuilding,
    TreePreservationOrder,
    #[serde(rename = "article_4_direction")]
    Article4Direction,
    Section106,
    Cil,
    EnforcementNotice,
    HighwayAdoption,
    Radon,
    BuildingRegs,
    ContaminatedLand,
    SmokeControl,
    LightingConsent,
    Council,
    PropertyAddress,
    Postcode,
    Uprn,
    TitleNumber,
    PlanningReferences,
}

impl FieldName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FloodZone => "flood_zone",
            Self::ConservationArea => "conservation_area",
            Self::ListedBuilding => "listed_building",
            Self::TreePreservationOrder => "tree_preservation_order",
            Self::Article4Direction => "article_4_direction",
            Self::Section106 => "section_106",
            Self::Cil => "cil",
            Self::EnforcementNotice => "enforcement_notice",
            Self::HighwayAdoption => "highway_adoption",
            Self::Radon => "radon",
            Self::BuildingRegs => "building_regs",
            Self::ContaminatedLand => "contaminated_land",
            Self::SmokeControl => "smoke_control",
            Self::LightingConsent => "lighting_consent",
            Self::Council => "council",
            Self::PropertyAddress => "property_address",
            Self::Postcode => "postcode",
            Self::Uprn => "uprn",
            Self::TitleNumber => "title_number",
            Self::PlanningReferences => "planning_references",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        ALL_FIELDS.iter().copied().find(|f| f.as_str() == s)
    }
}

const ALL_FIELDS: [FieldName; 20] = [
    FieldName::FloodZone,
    FieldName::ConservationArea,
    FieldName::ListedBuilding,
    FieldName::TreePreservationOrder,
    FieldName::Article4Direction,
    FieldName::Section106,
    FieldName::Cil,
    FieldName::EnforcementNotice,
    FieldName::HighwayAdoption,
    FieldName::Radon,
    FieldName::BuildingRegs,
    FieldName::ContaminatedLand,
    FieldName::SmokeControl,
    FieldName::LightingConsent,
    FieldName::Council,
    FieldName::PropertyAddress,
    FieldName::Postcode,
    FieldName::Uprn,
    FieldName::TitleNumber,
    FieldName::PlanningReferences,
];

impl std::fmt::Display for FieldName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value captured for a matched field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ExtractedValue {
    /// Keyword found, no further detail.
    Present,
    /// Explicit yes/no style answer following the keyword.
    Flag(bool),
    /// Numeric level, e.g. flood zone 1..=3.
    Level(u8),
    Text(String),
    List(Vec<String>),
}

impl ExtractedValue {
    /// Human-readable rendering used for raw values in findings and reports.
    pub fn display(&self) -> String {
        match self {
            Self::Present => "present".to_string(),
            Self::Flag(true) => "yes".to_string(),
            Self::Flag(false) => "no".to_string(),
            Self::Level(n) => n.to_string(),
            Self::Text(s) => s.clone(),
            Self::List(items) => items.join("; "),
        }
    }
}

/// One matched field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedField {
    pub name: FieldName,
    pub value: ExtractedValue,
    /// Sentence around the match, original casing.
    pub snippet: String,
    /// Byte offset of the match in the normalized text.
    pub offset: usize,
}

/// Flat field-name → value mapping in discovery order (position in text).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractedFields {
    fields: Vec<ExtractedField>,
}

impl ExtractedFields {
    pub fn new(fields: Vec<ExtractedField>) -> Self {
        Self { fields }
    }

    pub fn get(&self, name: FieldName) -> Option<&ExtractedField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn contains(&self, name: FieldName) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExtractedField> {
        self.fields.iter()
    }

    pub fn names(&self) -> Vec<FieldName> {
        self.fields.iter().map(|f| f.name).collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Subset of this mapping restricted to `names`, order preserved.
    pub fn retain_only(&self, names: &[FieldName]) -> Self {
        Self {
            fields: self
                .fields
                .iter()
                .filter(|f| names.contains(&f.name))
                .cloned()
                .collect(),
        }
    }
}

impl IntoIterator for ExtractedFields {
    type Item = ExtractedField;
    type IntoIter = std::vec::IntoIter<ExtractedField>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

// ---------------------------------------------------------------
// Rule table
// ---------------------------------------------------------------

struct Hit {
    value: ExtractedValue,
    range: Range<usize>,
}

type Eval = fn(&NormalizedText) -> Option<Hit>;

struct FieldRule {
    name: FieldName,
    applies_to: &'static [DocumentType],
    eval: Eval,
}

impl FieldRule {
    fn applies(&self, doc_type: DocumentType) -> bool {
        doc_type == DocumentType::Search || self.applies_to.contains(&doc_type)
    }
}

const LLC1: &[DocumentType] = &[DocumentType::Llc1];
const CON29: &[DocumentType] = &[DocumentType::Con29];
const BOTH: &[DocumentType] = &[DocumentType::Llc1, DocumentType::Con29];

static RULES: &[FieldRule] = &[
    FieldRule { name: FieldName::FloodZone, applies_to: CON29, eval: eval_flood_zone },
    FieldRule { name: FieldName::ConservationArea, applies_to: LLC1, eval: eval_conservation_area },
    FieldRule { name: FieldName::ListedBuilding, applies_to: LLC1, eval: eval_listed_building },
    FieldRule { name: FieldName::TreePreservationOrder, applies_to: LLC1, eval: eval_tpo },
    FieldRule { name: FieldName::Article4Direction, applies_to: LLC1, eval: eval_article4 },
    FieldRule { name: FieldName::Section106, applies_to: BOTH, eval: eval_s106 },
    FieldRule { name: FieldName::Cil, applies_to: BOTH, eval: eval_cil },
    FieldRule { name: FieldName::EnforcementNotice, applies_to: CON29, eval: eval_enforcement },
    FieldRule { name: FieldName::HighwayAdoption, applies_to: CON29, eval: eval_highway },
    FieldRule { name: FieldName::Radon, applies_to: CON29, eval: eval_radon },
    FieldRule { name: FieldName::BuildingRegs, applies_to: CON29, eval: eval_building_regs },
    FieldRule { name: FieldName::ContaminatedLand, applies_to: CON29, eval: eval_contaminated },
    FieldRule { name: FieldName::SmokeControl, applies_to: LLC1, eval: eval_smoke_control },
    FieldRule { name: FieldName::LightingConsent, applies_to: LLC1, eval: eval_lighting_consent },
    FieldRule { name: FieldName::Council, applies_to: BOTH, eval: eval_council },
    FieldRule { name: FieldName::PropertyAddress, applies_to: BOTH, eval: eval_address },
    FieldRule { name: FieldName::Postcode, applies_to: BOTH, eval: eval_postcode },
    FieldRule { name: FieldName::Uprn, applies_to: BOTH, eval: eval_uprn },
    FieldRule { name: FieldName::TitleNumber, applies_to: BOTH, eval: eval_title_number },
    FieldRule { name: FieldName::PlanningReferences, applies_to: CON29, eval: eval_planning_refs },
];

// Patterns run against the ASCII-folded copy, so they are written lowercase.
static FLOOD_ZONE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bflood\s*(?:risk\s*)?zone\s*([123])\b").unwrap());
static CONSERVATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bconservation\s+areas?\b").unwrap());
static LISTED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\blisted\s+buildings?\b(?:[^.\n]{0,30}?\bgrade\s+(ii\*|i{1,3}\b))?").unwrap()
});
static TPO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\btree\s+preservation(?:\s+orders?)?\b|\btpos?\b").unwrap()
});
static ARTICLE4_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\barticle\s*4\b(?:\s+directions?\b)?").unwrap());
static S106_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bsection\s*106\b|\bs\.?\s?106\b").unwrap());
static CIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:\bcommunity\s+infrastructure\s+levy\b|\bcil\b)(?:[^.\n]{0,40}?\b(yes|no|none|outstanding|payable|paid|true|false)\b)?",
    )
    .unwrap()
});
static ENFORCEMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\benforcement\s+notices?\b(?:[^.\n]{0,40}?\b(yes|no|none|true|false|served|present|outstanding)\b)?",
    )
    .unwrap()
});
static UNADOPTED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:unadopted\s+(?:road|highway|street)|not\s+(?:an?\s+)?adopted\s+(?:road|highway)|private\s+(?:road|street))s?\b",
    )
    .unwrap()
});
static ADOPTED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:highways?|roads?|footways?)\b[^.\n]{0,40}?\badopted\b[^.\n]{0,20}?\b(yes|no|true|false)\b",
    )
    .unwrap()
});
static RADON_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\bradon\b(?:[^.\n]{0,40}?\b(not\s+affected|affected|protection|yes|no|true|false)\b)?",
    )
    .unwrap()
});
static BUILDING_REGS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:building\s+reg(?:ulation)?s?|completion\s+certificates?)\b(?:[^.\n]{0,40}?\b(not\s+provided|provided|missing|yes|no|none|true|false)\b)?",
    )
    .unwrap()
});
static CONTAMINATED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\bcontaminated\s+land\b(?:[^.\n]{0,40}?\b(yes|no|none|true|false|designated)\b)?",
    )
    .unwrap()
});
static SMOKE_CONTROL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\bsmoke\s+control(?:\s+(?:areas?|orders?|zones?))?\b(?:[^.\n]{0,40}?\b(yes|no|none|true|false|designated)\b)?",
    )
    .unwrap()
});
static LIGHTING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:lighting\s+(?:consents?|schemes?|orders?)|street\s+lighting)\b(?:[^.\n]{0,40}?\b(yes|no|none|true|false)\b)?",
    )
    .unwrap()
});
static COUNCIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:local\s+authority|council)\s*:\s*([^\n]+)").unwrap());
static ADDRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:site\s+address|property\s+address|address)\s*:\s*([^\n]+)").unwrap()
});
static POSTCODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bpost\s?code\s*:?\s*([a-z]{1,2}\d[a-z\d]?\s*\d[a-z]{2})\b").unwrap()
});
static UPRN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\buprn\s*:?\s*(\d{5,12})\b").unwrap());
static TITLE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\btitle\s+(?:number|no\.?)\s*:?\s*([a-z]{0,3}\d{1,8})\b").unwrap()
});
static PLANNING_REF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:[a-z]{1,3}/\d{2,4}/\d{1,5}[a-z]?|\d{1,2}/\d{2}/\d{3,5}/[a-z]{2,4}|\d{2}/\d{4,5}[a-z]?)\b",
    )
    .unwrap()
});

/// Run every rule applicable to `doc_type` against `text`.
///
/// Never fails: empty or garbage input yields an empty mapping.
pub fn extract(text: &NormalizedText, doc_type: DocumentType) -> ExtractedFields {
    if text.is_empty() {
        return ExtractedFields::default();
    }

    let mut fields: Vec<ExtractedField> = RULES
        .iter()
        .filter(|rule| rule.applies(doc_type))
        .filter_map(|rule| {
            let hit = (rule.eval)(text)?;
            debug!(field = rule.name.as_str(), offset = hit.range.start, "field matched");
            Some(ExtractedField {
                name: rule.name,
                snippet: snippet(&text.text, &hit.range),
                offset: hit.range.start,
                value: hit.value,
            })
        })
        .collect();

    // Discovery order; ties keep table order (sort is stable).
    fields.sort_by_key(|f| f.offset);
    ExtractedFields::new(fields)
}

/// Normalize `raw` and extract in one call.
pub fn extract_raw(raw: &str, doc_type: DocumentType) -> ExtractedFields {
    extract(&NormalizedText::new(Some(raw)), doc_type)
}

// ---------------------------------------------------------------
// Rule evaluators
// ---------------------------------------------------------------

fn eval_flood_zone(text: &NormalizedText) -> Option<Hit> {
    // Worst zone mentioned wins.
    FLOOD_ZONE_RE
        .captures_iter(&text.folded)
        .filter_map(|caps| {
            let level: u8 = caps.get(1)?.as_str().parse().ok()?;
            Some((level, caps.get(0)?.range()))
        })
        .max_by(|a, b| a.0.cmp(&b.0).then(b.1.start.cmp(&a.1.start)))
        .map(|(level, range)| Hit { value: ExtractedValue::Level(level), range })
}

fn eval_conservation_area(text: &NormalizedText) -> Option<Hit> {
    presence(text, &CONSERVATION_RE)
}

fn eval_listed_building(text: &NormalizedText) -> Option<Hit> {
    let caps = LISTED_RE.captures(&text.folded)?;
    let value = match caps.get(1) {
        Some(grade) => ExtractedValue::Text(format!("Grade {}", grade.as_str().to_uppercase())),
        None => ExtractedValue::Present,
    };
    Some(Hit { value, range: caps.get(0)?.range() })
}

fn eval_tpo(text: &NormalizedText) -> Option<Hit> {
    presence(text, &TPO_RE)
}

fn eval_article4(text: &NormalizedText) -> Option<Hit> {
    presence(text, &ARTICLE4_RE)
}

fn eval_s106(text: &NormalizedText) -> Option<Hit> {
    presence(text, &S106_RE)
}

fn eval_cil(text: &NormalizedText) -> Option<Hit> {
    flagged(text, &CIL_RE)
}

fn eval_enforcement(text: &NormalizedText) -> Option<Hit> {
    flagged(text, &ENFORCEMENT_RE)
}

fn eval_highway(text: &NormalizedText) -> Option<Hit> {
    if let Some(m) = UNADOPTED_RE.find(&text.folded) {
        return Some(Hit { value: ExtractedValue::Flag(false), range: m.range() });
    }
    ADOPTED_RE.captures_iter(&text.folded).find_map(|caps| {
        let adopted = classify_flag(caps.get(1)?.as_str())?;
        Some(Hit { value: ExtractedValue::Flag(adopted), range: caps.get(0)?.range() })
    })
}

fn eval_radon(text: &NormalizedText) -> Option<Hit> {
    flagged(text, &RADON_RE)
}

fn eval_building_regs(text: &NormalizedText) -> Option<Hit> {
    flagged(text, &BUILDING_REGS_RE)
}

fn eval_contaminated(text: &NormalizedText) -> Option<Hit> {
    flagged(text, &CONTAMINATED_RE)
}

fn eval_smoke_control(text: &NormalizedText) -> Option<Hit> {
    flagged(text, &SMOKE_CONTROL_RE)
}

fn eval_lighting_consent(text: &NormalizedText) -> Option<Hit> {
    flagged(text, &LIGHTING_RE)
}

fn eval_council(text: &NormalizedText) -> Option<Hit> {
    captured_text(text, &COUNCIL_RE, false)
}

fn eval_address(text: &NormalizedText) -> Option<Hit> {
    captured_text(text, &ADDRESS_RE, false)
}

fn eval_postcode(text: &NormalizedText) -> Option<Hit> {
    let mut hit = captured_text(text, &POSTCODE_RE, true)?;
    if let ExtractedValue::Text(code) = &hit.value {
        hit.value = ExtractedValue::Text(code.split_whitespace().collect::<Vec<_>>().join(" "));
    }
    Some(hit)
}

fn eval_uprn(text: &NormalizedText) -> Option<Hit> {
    captured_text(text, &UPRN_RE, false)
}

fn eval_title_number(text: &NormalizedText) -> Option<Hit> {
    captured_text(text, &TITLE_RE, true)
}

fn eval_planning_refs(text: &NormalizedText) -> Option<Hit> {
    let bytes = text.folded.as_bytes();
    let mut refs: Vec<String> = Vec::new();
    let mut first: Option<Range<usize>> = None;

    for m in PLANNING_REF_RE.find_iter(&text.folded) {
        // Skip fragments of longer slash-delimited runs such as dates.
        let before = m.start().checked_sub(1).map(|i| bytes[i]);
        let after = bytes.get(m.end()).copied();
        if before == Some(b'/') || after == Some(b'/') {
            continue;
        }
        let reference = text.text[m.range()].to_uppercase();
        if !refs.contains(&reference) {
            refs.push(reference);
        }
        if first.is_none() {
            first = Some(m.range());
        }
    }

    first.map(|range| Hit { value: ExtractedValue::List(refs), range })
}

// ---------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------

fn presence(text: &NormalizedText, re: &Regex) -> Option<Hit> {
    re.find(&text.folded)
        .map(|m| Hit { value: ExtractedValue::Present, range: m.range() })
}

/// First mention carrying an explicit answer wins; otherwise the first
/// bare mention is reported as [`ExtractedValue::Present`].
fn flagged(text: &NormalizedText, re: &Regex) -> Option<Hit> {
    let mut bare: Option<Range<usize>> = None;
    for caps in re.captures_iter(&text.folded) {
        let Some(whole) = caps.get(0) else { continue };
        if let Some(flag) = caps.get(1).and_then(|m| classify_flag(m.as_str())) {
            return Some(Hit { value: ExtractedValue::Flag(flag), range: whole.range() });
        }
        if bare.is_none() {
            bare = Some(whole.range());
        }
    }
    bare.map(|range| Hit { value: ExtractedValue::Present, range })
}

fn captured_text(text: &NormalizedText, re: &Regex, uppercase: bool) -> Option<Hit> {
    let caps = re.captures(&text.folded)?;
    let whole = caps.get(0)?.range();
    let group = caps.get(1)?.range();
    let raw = text.text[group].trim();
    if raw.is_empty() {
        return None;
    }
    let value = truncate_chars(raw, TEXT_VALUE_MAX_CHARS);
    let value = if uppercase { value.to_uppercase() } else { value };
    Some(Hit { value: ExtractedValue::Text(value), range: whole })
}

fn classify_flag(word: &str) -> Option<bool> {
    let word = word.split_whitespace().collect::<Vec<_>>().join(" ");
    match word.as_str() {
        "yes" | "true" | "present" | "provided" | "outstanding" | "payable" | "affected"
        | "served" | "designated" | "protection" => Some(true),
        "no" | "false" | "none" | "absent" | "not affected" | "missing" | "not provided"
        | "paid" => Some(false),
        _ => None,
    }
}

/// Sentence (bounded by `.` or newline) around `range`, original casing.
fn snippet(text: &str, range: &Range<usize>) -> String {
    let start = text[..range.start]
        .rfind(|c: char| c == '\n' || c == '.')
        .map(|i| i + 1)
        .unwrap_or(0);
    let end = text[range.end..]
        .find(|c: char| c == '\n' || c == '.')
        .map(|i| {
            let at = range.end + i;
            if text.as_bytes()[at] == b'.' {
                at + 1
            } else {
                at
            }
        })
        .unwrap_or(text.len());
    truncate_chars(text[start..end].trim(), SNIPPET_MAX_CHARS)
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(raw: &str) -> ExtractedFields {
        extract_raw(raw, DocumentType::Search)
    }

    #[test]
    fn test_empty_text_yields_nothing() {
        assert!(fields("").is_empty());
        assert!(extract(&NormalizedText::new(None), DocumentType::Con29).is_empty());
    }

    #[test]
    fn test_garbage_does_not_panic() {
        let garbage = "\u{0}\u{1}%%EOF ((( ))) 106/ /// flood zone 9 ... \u{FFFD}";
        let result = fields(garbage);
        assert!(!result.contains(FieldName::FloodZone));
    }

    #[test]
    fn test_combined_search_collects_all_fields() {
        let text = "Conservation Area. Listed Building. S106 applies.\n\
                    Enforcement notice: yes. Flood Zone 3.";
        let result = fields(text);
        for name in [
            FieldName::ConservationArea,
            FieldName::ListedBuilding,
            FieldName::Section106,
            FieldName::EnforcementNotice,
            FieldName::FloodZone,
        ] {
            assert!(result.contains(name), "missing {name}");
        }
        assert_eq!(
            result.get(FieldName::EnforcementNotice).unwrap().value,
            ExtractedValue::Flag(true)
        );
        assert_eq!(result.get(FieldName::FloodZone).unwrap().value, ExtractedValue::Level(3));
    }

    #[test]
    fn test_discovery_order_follows_text_position() {
        let text = "Flood Zone 2. Tree Preservation Order. Conservation Area.";
        assert_eq!(
            fields(text).names(),
            vec![
                FieldName::FloodZone,
                FieldName::TreePreservationOrder,
                FieldName::ConservationArea
            ]
        );
    }

    #[test]
    fn test_negated_mention_still_matches() {
        // Keyword presence only; negation is not understood.
        let result = fields("The property is not within a Conservation Area.");
        let field = result.get(FieldName::ConservationArea).unwrap();
        assert_eq!(field.value, ExtractedValue::Present);
        assert_eq!(field.snippet, "The property is not within a Conservation Area.");
    }

    #[test]
    fn test_document_type_limits_rules() {
        let text = "Conservation Area. Flood Zone 3. Section 106 agreement.";
        let llc1 = extract_raw(text, DocumentType::Llc1);
        assert!(llc1.contains(FieldName::ConservationArea));
        assert!(!llc1.contains(FieldName::FloodZone));
        assert!(llc1.contains(FieldName::Section106));

        let con29 = extract_raw(text, DocumentType::Con29);
        assert!(!con29.contains(FieldName::ConservationArea));
        assert!(con29.contains(FieldName::FloodZone));
        assert!(con29.contains(FieldName::Section106));
    }

    #[test]
    fn test_flood_zone_takes_worst_level() {
        let result = fields("Flood zone 1 for the garden; flood risk zone 2 at the rear.");
        assert_eq!(result.get(FieldName::FloodZone).unwrap().value, ExtractedValue::Level(2));
    }

    #[test]
    fn test_flags_capture_answers() {
        let result = fields(
            "Enforcement notices: none.\nCIL outstanding.\nRadon: not affected.\n\
             Building regulations completion certificate: missing.\nContaminated land: no.",
        );
        assert_eq!(result.get(FieldName::EnforcementNotice).unwrap().value, ExtractedValue::Flag(false));
        assert_eq!(result.get(FieldName::Cil).unwrap().value, ExtractedValue::Flag(true));
        assert_eq!(result.get(FieldName::Radon).unwrap().value, ExtractedValue::Flag(false));
        assert_eq!(result.get(FieldName::BuildingRegs).unwrap().value, ExtractedValue::Flag(false));
        assert_eq!(result.get(FieldName::ContaminatedLand).unwrap().value, ExtractedValue::Flag(false));
    }

    #[test]
    fn test_llc1_smoke_and_lighting_entries() {
        let text = "Smoke Control Area: designated under the Clean Air Act.\n\
                    Lighting scheme: none.";
        let llc1 = extract_raw(text, DocumentType::Llc1);
        assert_eq!(llc1.get(FieldName::SmokeControl).unwrap().value, ExtractedValue::Flag(true));
        assert_eq!(llc1.get(FieldName::LightingConsent).unwrap().value, ExtractedValue::Flag(false));

        let con29 = extract_raw(text, DocumentType::Con29);
        assert!(!con29.contains(FieldName::SmokeControl));
        assert!(!con29.contains(FieldName::LightingConsent));
    }

    #[test]
    fn test_bare_keyword_is_present() {
        let result = fields("Details of any enforcement notice are attached");
        assert_eq!(result.get(FieldName::EnforcementNotice).unwrap().value, ExtractedValue::Present);
    }

    #[test]
    fn test_highway_adoption() {
        let adopted = fields("Abutting Highway Adopted: YES");
        assert_eq!(adopted.get(FieldName::HighwayAdoption).unwrap().value, ExtractedValue::Flag(true));

        let not_adopted = fields("Abutting Highway Adopted: NO\nHighways Authority: HCC Highways");
        assert_eq!(not_adopted.get(FieldName::HighwayAdoption).unwrap().value, ExtractedValue::Flag(false));

        let unadopted = fields("Access is via an unadopted road.");
        assert_eq!(unadopted.get(FieldName::HighwayAdoption).unwrap().value, ExtractedValue::Flag(false));
    }

    #[test]
    fn test_listed_building_grade() {
        let result = fields("Listed building, grade II* (list entry 1234567).");
        assert_eq!(
            result.get(FieldName::ListedBuilding).unwrap().value,
            ExtractedValue::Text("Grade II*".into())
        );
    }

    #[test]
    fn test_property_details() {
        let text = "Local Authority: Hertfordshire County Council\n\
                    Address: 1 High Street, Hertford\n\
                    Postcode: sg13 8aa\nUPRN: 100081234567\nTitle Number: hd123456";
        let result = fields(text);
        assert_eq!(
            result.get(FieldName::Council).unwrap().value,
            ExtractedValue::Text("Hertfordshire County Council".into())
        );
        assert_eq!(
            result.get(FieldName::PropertyAddress).unwrap().value,
            ExtractedValue::Text("1 High Street, Hertford".into())
        );
        assert_eq!(result.get(FieldName::Postcode).unwrap().value, ExtractedValue::Text("SG13 8AA".into()));
        assert_eq!(result.get(FieldName::Uprn).unwrap().value, ExtractedValue::Text("100081234567".into()));
        assert_eq!(result.get(FieldName::TitleNumber).unwrap().value, ExtractedValue::Text("HD123456".into()));
    }

    #[test]
    fn test_planning_refs_skip_dates() {
        let text = "Planning Permission: 3/19/1234/FUL Granted 12/06/2019. Earlier ref SP/03/12 and 12/3746N.";
        let result = extract_raw(text, DocumentType::Con29);
        let refs = match &result.get(FieldName::PlanningReferences).unwrap().value {
            ExtractedValue::List(items) => items.clone(),
            other => panic!("unexpected value {other:?}"),
        };
        assert_eq!(refs, vec!["3/19/1234/FUL", "SP/03/12", "12/3746N"]);
    }

    #[test]
    fn test_field_name_round_trip_strings() {
        assert_eq!(FieldName::parse("article_4_direction"), Some(FieldName::Article4Direction));
        assert_eq!(FieldName::parse("nope"), None);
        assert_eq!(DocumentType::from_kind("LLC1"), DocumentType::Llc1);
        assert_eq!(DocumentType::from_kind("search"), DocumentType::Search);
    }
}
