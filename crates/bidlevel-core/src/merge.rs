//! Fold reconciled contractors into one Leveling Report.

use std::collections::BTreeMap;

use crate::model::{
    ContractorSummary, LevelingReport, MatrixCell, Qualifications, ScopeStatus, ScoredItem,
    UnmappedItem,
};
use crate::reconcile::{apply, ReconciledContractor};
use crate::scope::{is_alternate_item, CandidateScopeList};
use crate::text::normalize_key;

/// One contractor's reconciled answer plus identity.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractorResult {
    pub contractor_id: String,
    pub name: String,
    pub reconciled: ReconciledContractor,
}

/// Sum of included, priced, non-alternate rows. `None` if nothing qualifies.
pub fn derived_total(items: &[ScoredItem]) -> Option<f64> {
    let prices: Vec<f64> = items
        .iter()
        .filter(|i| i.status == ScopeStatus::Included)
        .filter(|i| !is_alternate_item(&i.candidate_scope_item))
        .filter_map(|i| i.price)
        .collect();
    (!prices.is_empty()).then(|| prices.iter().sum())
}

/// Build the report. Every (scope item, contractor) pair gets a cell.
pub fn merge_report(list: &CandidateScopeList, results: &[ContractorResult]) -> LevelingReport {
    let mut scope_items: Vec<String> = list.as_slice().to_vec();
    for result in results {
        for item in &result.reconciled.items {
            let key = normalize_key(&item.candidate_scope_item);
            if !scope_items.iter().any(|s| normalize_key(s) == key) {
                scope_items.push(item.candidate_scope_item.clone());
            }
        }
    }

    let mut contractors: Vec<ContractorSummary> = Vec::new();
    let mut rows: BTreeMap<String, BTreeMap<String, ScoredItem>> = BTreeMap::new();
    let mut qualifications: BTreeMap<String, Qualifications> = BTreeMap::new();
    let mut unmapped: BTreeMap<String, Vec<UnmappedItem>> = BTreeMap::new();

    for result in results {
        let id = result.contractor_id.clone();
        let per_item = rows.entry(id.clone()).or_default();
        for item in &result.reconciled.items {
            let canonical = scope_items
                .iter()
                .find(|s| normalize_key(s) == normalize_key(&item.candidate_scope_item))
                .cloned()
                .unwrap_or_else(|| item.candidate_scope_item.clone());
            let row = per_item
                .entry(canonical.clone())
                .or_insert_with(|| ScoredItem::unspecified(&canonical));
            apply(row, item.status, item.price, &item.evidence);
        }

        qualifications
            .entry(id.clone())
            .or_default()
            .absorb(&result.reconciled.qualifications);

        let bucket = unmapped.entry(id.clone()).or_default();
        for extra in &result.reconciled.unmapped {
            if !bucket.iter().any(|u| normalize_key(&u.name) == normalize_key(&extra.name)) {
                bucket.push(extra.clone());
            }
        }

        match contractors.iter_mut().find(|c| c.contractor_id == id) {
            Some(existing) => {
                if existing.total.is_none() {
                    existing.total = result.reconciled.total;
                }
            }
            None => contractors.push(ContractorSummary {
                contractor_id: id,
                name: result.name.clone(),
                total: result.reconciled.total,
            }),
        }
    }

    for summary in &mut contractors {
        if summary.total.is_none() {
            let items: Vec<ScoredItem> = rows
                .get(&summary.contractor_id)
                .map(|r| r.values().cloned().collect())
                .unwrap_or_default();
            summary.total = derived_total(&items);
        }
    }

    let mut matrix = BTreeMap::new();
    for item in &scope_items {
        let mut row = BTreeMap::new();
        for summary in &contractors {
            let cell = rows
                .get(&summary.contractor_id)
                .and_then(|r| r.get(item))
                .map(|scored| MatrixCell {
                    status: scored.status,
                    price: scored.price,
                })
                .unwrap_or_default();
            row.insert(summary.contractor_id.clone(), cell);
        }
        matrix.insert(item.clone(), row);
    }

    LevelingReport {
        scope_items,
        matrix,
        qualifications,
        contractors,
        unmapped,
    }
}
