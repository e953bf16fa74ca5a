//! Candidate Scope List: the ordered, case-insensitively unique vocabulary every
//! contractor is scored against.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dictionary::ScopeDictionary;
use crate::heuristics::{AlternateLine, ContractorCandidates, ExtractionRules};
use crate::text::normalize_key;

/// Hard cap on list length.
pub const MAX_CANDIDATES: usize = 100;
/// Most items taken from an advisory proposal before heuristics fill the rest.
pub const MAX_PROPOSED: usize = 80;
/// Prefix marking a priced-alternate row.
pub const ALTERNATE_PREFIX: &str = "Alternate:";

/// True for rows created from priced alternates.
pub fn is_alternate_item(name: &str) -> bool {
    name.trim_start()
        .get(..ALTERNATE_PREFIX.len())
        .is_some_and(|p| p.eq_ignore_ascii_case(ALTERNATE_PREFIX))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CandidateScopeList {
    items: Vec<String>,
}

impl CandidateScopeList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append unless a case-insensitive duplicate exists or the list is full.
    /// Returns whether the item was added.
    pub fn push(&mut self, item: &str) -> bool {
        self.push_capped(item, MAX_CANDIDATES)
    }

    fn push_capped(&mut self, item: &str, cap: usize) -> bool {
        let item = item.trim();
        if item.is_empty() || self.items.len() >= cap || self.contains(item) {
            return false;
        }
        self.items.push(item.to_string());
        true
    }

    pub fn contains(&self, item: &str) -> bool {
        self.index_of(item).is_some()
    }

    /// Zero-based position of `item`, compared case-insensitively.
    pub fn index_of(&self, item: &str) -> Option<usize> {
        let key = normalize_key(item);
        self.items.iter().position(|i| normalize_key(i) == key)
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.items.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.items
    }

    /// `1. Ductwork` style listing used in prompts.
    pub fn numbered(&self) -> String {
        self.items
            .iter()
            .enumerate()
            .map(|(i, item)| format!("{}. {item}", i + 1))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Build the deterministic list from every contractor's harvest, in contractor
/// order. Lines are canonicalised through `dictionary`; alternates go last.
pub fn build_candidate_list(
    harvests: &[ContractorCandidates],
    dictionary: &ScopeDictionary,
) -> CandidateScopeList {
    let alternate_labels = collect_alternate_labels(harvests);
    let base_cap = MAX_CANDIDATES.saturating_sub(alternate_labels.len());

    let mut list = CandidateScopeList::new();
    for harvest in harvests {
        for line in &harvest.lines {
            let name = dictionary.canonicalize(line).unwrap_or(line);
            list.push_capped(name, base_cap);
        }
    }
    for label in &alternate_labels {
        list.push(label);
    }
    debug!(items = list.len(), alternates = alternate_labels.len(), "candidate list built");
    list
}

/// Combine an advisory proposal with the heuristic list.
///
/// Proposed items lead (cleaned, canonicalised, at most [`MAX_PROPOSED`]), then
/// heuristic items fill gaps, then every alternate row is carried over.
pub fn merge_proposals(
    proposed: &[String],
    heuristic: &CandidateScopeList,
    dictionary: &ScopeDictionary,
    rules: &ExtractionRules,
) -> CandidateScopeList {
    let alternates: Vec<&str> = heuristic.iter().filter(|i| is_alternate_item(i)).collect();
    let base_cap = MAX_CANDIDATES.saturating_sub(alternates.len());

    let mut list = CandidateScopeList::new();
    let mut taken = 0;
    for raw in proposed {
        if taken >= MAX_PROPOSED {
            break;
        }
        if is_alternate_item(raw) {
            continue;
        }
        let Some(cleaned) = rules.clean_candidate(raw) else {
            continue;
        };
        let name = dictionary.canonicalize(&cleaned).unwrap_or(&cleaned).to_string();
        if list.push_capped(&name, base_cap) {
            taken += 1;
        }
    }
    for item in heuristic.iter().filter(|i| !is_alternate_item(i)) {
        list.push_capped(item, base_cap);
    }
    for label in alternates {
        list.push(label);
    }
    list
}

fn collect_alternate_labels(harvests: &[ContractorCandidates]) -> Vec<String> {
    let mut labels: Vec<String> = Vec::new();
    for alternate in harvests.iter().flat_map(|h| h.alternates.iter()) {
        let AlternateLine { label, .. } = alternate;
        if !labels.iter().any(|l| normalize_key(l) == normalize_key(label)) {
            labels.push(label.clone());
        }
    }
    labels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EvidenceFragment;

    fn harvest(id: &str, text: &str) -> ContractorCandidates {
        ExtractionRules::default().harvest(id, &[EvidenceFragment::new("doc p.1", text)])
    }

    #[test]
    fn push_is_case_insensitive_and_capped() {
        let mut list = CandidateScopeList::new();
        assert!(list.push("Ductwork"));
        assert!(!list.push("  DUCTWORK "));
        assert_eq!(list.index_of("ductwork"), Some(0));
        for i in 0..200 {
            list.push(&format!("Item {i}"));
        }
        assert_eq!(list.len(), MAX_CANDIDATES);
    }

    #[test]
    fn numbered_is_one_based() {
        let mut list = CandidateScopeList::new();
        list.push("Ductwork");
        list.push("Controls");
        assert_eq!(list.numbered(), "1. Ductwork\n2. Controls");
    }

    #[test]
    fn canonicalises_and_dedupes_across_contractors() {
        let dict = ScopeDictionary::hvac();
        let a = harvest("a", "Scope:\nInstall ductwork throughout\n40 ton AHU");
        let b = harvest("b", "Ductwork: excluded, by others");
        let list = build_candidate_list(&[a, b], &dict);
        assert_eq!(list.as_slice(), &["Ductwork".to_string(), "HVAC equipment".to_string()]);
    }

    #[test]
    fn generic_dictionary_keeps_wording() {
        let dict = ScopeDictionary::generic("26");
        let a = harvest("a", "Scope:\nLighting fixtures\nPanelboards");
        let list = build_candidate_list(&[a], &dict);
        assert_eq!(list.as_slice(), &["Lighting fixtures".to_string(), "Panelboards".to_string()]);
    }

    #[test]
    fn alternates_survive_the_cap() {
        let dict = ScopeDictionary::generic("23");
        let mut lines = String::from("Scope:\n");
        for i in 0..150 {
            lines.push_str(&format!("Widget model {i}\n"));
        }
        lines.push_str("ADD ALTERNATE #1: VFDs on pumps $7,600\n");
        let list = build_candidate_list(&[harvest("a", &lines)], &dict);
        assert_eq!(list.len(), MAX_CANDIDATES);
        assert_eq!(list.get(MAX_CANDIDATES - 1), Some("Alternate: VFDs on pumps"));
    }

    #[test]
    fn proposals_lead_then_heuristics_fill() {
        let dict = ScopeDictionary::hvac();
        let rules = ExtractionRules::default();
        let mut heuristic = CandidateScopeList::new();
        heuristic.push("Ductwork");
        heuristic.push("Boiler");
        heuristic.push("Alternate: VFDs on pumps");

        let proposed = vec![
            "Controls and BAS".to_string(),
            "duct work".to_string(),
            "Alternate: something else".to_string(),
        ];
        let merged = merge_proposals(&proposed, &heuristic, &dict, &rules);
        assert_eq!(
            merged.as_slice(),
            &[
                "Controls".to_string(),
                "Ductwork".to_string(),
                "Boiler".to_string(),
                "Alternate: VFDs on pumps".to_string(),
            ]
        );
    }

    #[test]
    fn proposals_capped() {
        let dict = ScopeDictionary::generic("23");
        let rules = ExtractionRules::default();
        let proposed: Vec<String> = (0..120).map(|i| format!("Proposed item {i}")).collect();
        let mut heuristic = CandidateScopeList::new();
        heuristic.push("Heuristic only");
        let merged = merge_proposals(&proposed, &heuristic, &dict, &rules);
        assert_eq!(merged.len(), MAX_PROPOSED + 1);
        assert_eq!(merged.get(MAX_PROPOSED), Some("Heuristic only"));
    }

    #[test]
    fn alternate_prefix_detection() {
        assert!(is_alternate_item("Alternate: VFDs"));
        assert!(is_alternate_item("alternate: vfds"));
        assert!(!is_alternate_item("Alternates not included"));
        assert!(!is_alternate_item("VFDs"));
    }
}
