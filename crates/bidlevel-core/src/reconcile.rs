//! Pin a contractor's free-form scoring answer onto the Candidate Scope List.
//!
//! Output always has exactly one row per candidate, in list order. Anything that
//! cannot be resolved goes to `unmapped`. The function is pure, so running it
//! twice on the same input gives the same rows.

use tracing::debug;

use crate::dictionary::ScopeDictionary;
use crate::fuzzy;
use crate::heuristics::ContractorCandidates;
use crate::model::{Qualifications, ScopeStatus, ScoredItem, UnmappedItem};
use crate::scope::CandidateScopeList;
use crate::scoring::{RawItem, RawScoring};
use crate::text::normalize_key;

/// How an oracle item was tied to a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMethod {
    Index,
    Exact,
    Dictionary,
    Fuzzy,
}

/// One contractor's rows after reconciliation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciledContractor {
    pub items: Vec<ScoredItem>,
    pub unmapped: Vec<UnmappedItem>,
    pub qualifications: Qualifications,
    pub total: Option<f64>,
}

pub struct Reconciler<'a> {
    list: &'a CandidateScopeList,
    dictionary: &'a ScopeDictionary,
}

impl<'a> Reconciler<'a> {
    pub fn new(list: &'a CandidateScopeList, dictionary: &'a ScopeDictionary) -> Self {
        Self { list, dictionary }
    }

    /// Resolve an item to a zero-based candidate position.
    pub fn resolve(&self, item: &RawItem) -> Option<(usize, MatchMethod)> {
        if let Some(index) = item.one_based_index() {
            if (1..=self.list.len()).contains(&index) {
                return Some((index - 1, MatchMethod::Index));
            }
        }
        self.resolve_name(item.name()?)
    }

    /// Name-only resolution: exact, then dictionary, then fuzzy.
    pub fn resolve_name(&self, name: &str) -> Option<(usize, MatchMethod)> {
        if let Some(position) = self.list.index_of(name) {
            return Some((position, MatchMethod::Exact));
        }
        if let Some(position) = self
            .dictionary
            .canonicalize(name)
            .and_then(|canonical| self.list.index_of(canonical))
        {
            return Some((position, MatchMethod::Dictionary));
        }
        fuzzy::best_match(name, self.list.iter(), self.dictionary)
            .map(|position| (position, MatchMethod::Fuzzy))
    }

    /// Reconcile one scoring answer. `extracted` carries the heuristic hints and
    /// alternates for the same contractor.
    pub fn reconcile(
        &self,
        raw: &RawScoring,
        extracted: &ContractorCandidates,
    ) -> ReconciledContractor {
        let mut items: Vec<ScoredItem> = self.list.iter().map(ScoredItem::unspecified).collect();
        let mut unmapped: Vec<UnmappedItem> = Vec::new();

        for item in &raw.items {
            match self.resolve(item) {
                Some((position, _)) => {
                    apply(&mut items[position], item.status(), item.price(), &item.evidence)
                }
                None => {
                    let name = match (item.name(), item.one_based_index()) {
                        (Some(name), _) => name.to_string(),
                        (None, Some(index)) => format!("#{index}"),
                        (None, None) => continue,
                    };
                    push_unmapped(&mut unmapped, name, &item.evidence);
                }
            }
        }
        // The oracle's own unmapped list may still name a candidate row. Those
        // rows keep their status and only pick up the evidence.
        for extra in raw.unmapped_items() {
            match self.resolve_name(&extra.name) {
                Some((position, _)) => apply(
                    &mut items[position],
                    ScopeStatus::NotSpecified,
                    None,
                    &extra.evidence,
                ),
                None => push_unmapped(&mut unmapped, extra.name, &extra.evidence),
            }
        }

        let mut qualifications = Qualifications::from(raw.qualifications.clone());
        qualifications.absorb(&extracted.hints);

        for alternate in &extracted.alternates {
            match self.list.index_of(&alternate.label) {
                Some(position) => {
                    let row = &mut items[position];
                    if row.status == ScopeStatus::NotSpecified {
                        row.status = ScopeStatus::Included;
                    }
                    if row.price.is_none() {
                        row.price = Some(alternate.price);
                    }
                    if row.evidence.is_empty() {
                        row.evidence = alternate.source_line.clone();
                    }
                }
                None => push_unmapped(&mut unmapped, alternate.label.clone(), &alternate.source_line),
            }
            crate::model::union_into(
                &mut qualifications.alternates,
                std::slice::from_ref(&alternate.source_line),
            );
        }

        debug!(
            contractor = %extracted.contractor_id,
            rows = items.len(),
            unmapped = unmapped.len(),
            "reconciled"
        );

        ReconciledContractor {
            items,
            unmapped,
            qualifications,
            total: raw.total(),
        }
    }
}

/// Fold a new answer into an existing row: status by precedence, first non-null price.
pub fn apply(row: &mut ScoredItem, status: ScopeStatus, price: Option<f64>, evidence: &str) {
    let evidence = evidence.trim();
    if status > row.status {
        row.status = status;
        if !evidence.is_empty() {
            row.evidence = evidence.to_string();
        }
    } else if row.evidence.is_empty() && status == row.status {
        row.evidence = evidence.to_string();
    }
    if row.price.is_none() {
        row.price = price;
    }
}

fn push_unmapped(unmapped: &mut Vec<UnmappedItem>, name: String, evidence: &str) {
    let key = normalize_key(&name);
    if unmapped.iter().any(|u| normalize_key(&u.name) == key) {
        return;
    }
    unmapped.push(UnmappedItem {
        name,
        evidence: evidence.trim().to_string(),
    });
}
