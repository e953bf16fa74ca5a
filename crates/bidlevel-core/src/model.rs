//! Shared leveling types: evidence in, matrix out.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::CoreError;

/// One table, page of text, or sheet extracted from one bid document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceFragment {
    pub source_name: String,
    pub raw_text: String,
}

impl EvidenceFragment {
    pub fn new(source_name: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            raw_text: raw_text.into(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.raw_text.trim().is_empty()
    }
}

/// Every fragment loaded for one contractor's bid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractorEvidence {
    pub contractor_id: String,
    pub name: String,
    pub fragments: Vec<EvidenceFragment>,
}

impl ContractorEvidence {
    /// Total characters of fragment text.
    pub fn text_len(&self) -> usize {
        self.fragments.iter().map(|f| f.raw_text.len()).sum()
    }

    pub fn has_text(&self) -> bool {
        self.fragments.iter().any(|f| !f.is_blank())
    }
}

/// Classification of one candidate scope item for one contractor.
///
/// Ordering follows merge precedence: `Included > Excluded > NotSpecified`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ScopeStatus {
    #[default]
    NotSpecified,
    Excluded,
    Included,
}

impl ScopeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Included => "included",
            Self::Excluded => "excluded",
            Self::NotSpecified => "not_specified",
        }
    }

    /// Map the loose wording an oracle uses onto a status.
    ///
    /// Anything unrecognised is `NotSpecified`; silence never becomes `Excluded`.
    pub fn from_loose(s: &str) -> Self {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "included" | "include" | "includes" | "incl" | "incl." | "yes" | "y" | "in"
            | "provided" | "furnished" => Self::Included,
            "excluded" | "exclude" | "excludes" | "excl" | "excl." | "no" | "n" | "out"
            | "by others" | "not included" | "nic" | "n.i.c." => Self::Excluded,
            _ => Self::NotSpecified,
        }
    }
}

impl fmt::Display for ScopeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScopeStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "included" => Ok(Self::Included),
            "excluded" => Ok(Self::Excluded),
            "not_specified" => Ok(Self::NotSpecified),
            other => Err(CoreError::UnknownStatus(other.to_string())),
        }
    }
}

/// One row per (contractor, candidate item) after reconciliation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem {
    pub candidate_scope_item: String,
    pub status: ScopeStatus,
    pub price: Option<f64>,
    pub evidence: String,
}

impl ScoredItem {
    pub fn unspecified(candidate: &str) -> Self {
        Self {
            candidate_scope_item: candidate.to_string(),
            status: ScopeStatus::NotSpecified,
            price: None,
            evidence: String::new(),
        }
    }
}

/// Free-text qualifications per contractor; not pinned to the scope vocabulary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Qualifications {
    pub includes: Vec<String>,
    pub excludes: Vec<String>,
    pub allowances: Vec<String>,
    pub alternates: Vec<String>,
    pub payment_terms: Vec<String>,
    pub fine_print: Vec<String>,
}

impl Qualifications {
    /// Union `other` into `self` field by field, deduplicating case-insensitively.
    pub fn absorb(&mut self, other: &Qualifications) {
        union_into(&mut self.includes, &other.includes);
        union_into(&mut self.excludes, &other.excludes);
        union_into(&mut self.allowances, &other.allowances);
        union_into(&mut self.alternates, &other.alternates);
        union_into(&mut self.payment_terms, &other.payment_terms);
        union_into(&mut self.fine_print, &other.fine_print);
    }

    pub fn is_empty(&self) -> bool {
        self.includes.is_empty()
            && self.excludes.is_empty()
            && self.allowances.is_empty()
            && self.alternates.is_empty()
            && self.payment_terms.is_empty()
            && self.fine_print.is_empty()
    }
}

/// Append entries from `extra` that are not already present (case-insensitive, trimmed).
pub fn union_into(target: &mut Vec<String>, extra: &[String]) {
    for item in extra {
        let trimmed = item.trim();
        if trimmed.is_empty() {
            continue;
        }
        let key = trimmed.to_lowercase();
        if !target.iter().any(|t| t.trim().to_lowercase() == key) {
            target.push(trimmed.to_string());
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractorSummary {
    pub contractor_id: String,
    pub name: String,
    pub total: Option<f64>,
}

/// An oracle-found mention that matched no candidate item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmappedItem {
    pub name: String,
    pub evidence: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MatrixCell {
    pub status: ScopeStatus,
    pub price: Option<f64>,
}

/// scope item → contractor_id → cell
pub type ScopeMatrix = BTreeMap<String, BTreeMap<String, MatrixCell>>;

/// The per-division output artifact. Never mutated after merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelingReport {
    pub scope_items: Vec<String>,
    pub matrix: ScopeMatrix,
    pub qualifications: BTreeMap<String, Qualifications>,
    pub contractors: Vec<ContractorSummary>,
    pub unmapped: BTreeMap<String, Vec<UnmappedItem>>,
}

impl LevelingReport {
    pub fn cell(&self, item: &str, contractor_id: &str) -> Option<&MatrixCell> {
        self.matrix.get(item)?.get(contractor_id)
    }

    pub fn cell_count(&self) -> usize {
        self.matrix.values().map(|row| row.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_precedence_ordering() {
        assert!(ScopeStatus::Included > ScopeStatus::Excluded);
        assert!(ScopeStatus::Excluded > ScopeStatus::NotSpecified);
        assert_eq!(ScopeStatus::default(), ScopeStatus::NotSpecified);
    }

    #[test]
    fn loose_status_wording() {
        assert_eq!(ScopeStatus::from_loose("Included"), ScopeStatus::Included);
        assert_eq!(ScopeStatus::from_loose(" by others "), ScopeStatus::Excluded);
        assert_eq!(ScopeStatus::from_loose("NIC"), ScopeStatus::Excluded);
        assert_eq!(ScopeStatus::from_loose("unclear"), ScopeStatus::NotSpecified);
        assert_eq!(ScopeStatus::from_loose(""), ScopeStatus::NotSpecified);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&ScopeStatus::NotSpecified).unwrap();
        assert_eq!(json, "\"not_specified\"");
        let parsed: ScopeStatus = "excluded".parse().unwrap();
        assert_eq!(parsed, ScopeStatus::Excluded);
        assert!("maybe".parse::<ScopeStatus>().is_err());
    }

    #[test]
    fn qualifications_absorb_dedups() {
        let mut a = Qualifications {
            excludes: vec!["Fire dampers".into()],
            ..Default::default()
        };
        let b = Qualifications {
            excludes: vec!["fire dampers ".into(), "Permits".into()],
            payment_terms: vec!["Net 30".into()],
            ..Default::default()
        };
        a.absorb(&b);
        assert_eq!(a.excludes, vec!["Fire dampers", "Permits"]);
        assert_eq!(a.payment_terms, vec!["Net 30"]);
    }

    #[test]
    fn qualifications_missing_fields_default() {
        let q: Qualifications = serde_json::from_str(r#"{"includes": ["Startup"]}"#).unwrap();
        assert_eq!(q.includes, vec!["Startup"]);
        assert!(q.alternates.is_empty());
    }
}
