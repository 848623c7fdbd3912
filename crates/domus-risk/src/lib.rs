//! Domus Risk: maps extracted search fields to weighted risk findings.
//!
//! Pure functions only. Nothing here performs I/O or fails on odd input;
//! a mapping with no recognised fields scores 0.0.

pub mod llc1;
pub mod scorer;
pub mod taxonomy;

pub use llc1::{map_llc1, Llc1Entry, Llc1Heading};
pub use scorer::{aggregate, score, score_sorted, RiskBand, RiskFinding, RiskResult, SCORE_NORMALIZER};
pub use taxonomy::{RiskCategory, Severity};
