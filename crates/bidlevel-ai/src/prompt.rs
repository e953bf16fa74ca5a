//! System instructions and evidence blocks sent to the oracle.

use bidlevel_core::{CandidateScopeList, ContractorEvidence, Qualifications};

pub const AGGREGATION_SYSTEM_PROMPT: &str = "\
You consolidate scope-of-work vocabularies for construction bid leveling.
You receive candidate scope lines harvested from several subcontractor proposals for one trade division.

Propose a single clean vocabulary of 20 to 40 scope items that covers the work described.

Rules:
- Use short noun phrases only (e.g. \"Ductwork\", \"Rooftop units\", \"Test and balance\").
- Merge wording variants of the same work into one item.
- Do not include prices, quantities, contractor names, or alternates.
- Do not invent work that does not appear in the candidates.

Respond ONLY with a JSON object:
{\"scope_items\": [\"<item>\", ...]}";

pub const SCORING_SYSTEM_PROMPT: &str = "\
You level one subcontractor's bid against a fixed list of numbered scope items.

For EVERY numbered candidate, output exactly one entry with:
- candidate_index: the candidate's number (1-based)
- status: \"included\", \"excluded\", or \"not_specified\"
- price: a number if the bid states a price for that item, otherwise null
- evidence: a short quote from the bid supporting the decision

Rules:
- Use the candidate numbers; never invent new item names.
- Mark \"excluded\" only when the bid explicitly excludes the item or assigns it to others.
- If the bid is silent about an item, use \"not_specified\". Silence is never an exclusion.
- Deduct alternates carry negative prices.
- Put scope the bid mentions that matches no candidate in \"unmapped\".

Respond ONLY with a JSON object:
{\"items\": [{\"candidate_index\": 1, \"status\": \"included\", \"price\": null, \"evidence\": \"...\"}],
 \"qualifications\": {\"includes\": [], \"excludes\": [], \"allowances\": [], \"alternates\": [], \"payment_terms\": [], \"fine_print\": []},
 \"total\": null,
 \"unmapped\": [{\"name\": \"...\", \"evidence\": \"...\"}]}";

pub const LENIENT_SCORING_SYSTEM_PROMPT: &str = "\
You level one subcontractor's bid against a fixed list of numbered scope items.
The bid text is raw and may be poorly formatted. Read all of it, including tables and notes.

For every numbered candidate, output one entry with candidate_index, status
(\"included\", \"excluded\" or \"not_specified\"), price (number or null) and evidence.
When the bid describes work that reasonably corresponds to a candidate, mark it \"included\".
Use \"excluded\" only for explicit exclusions. Use \"not_specified\" when the bid is silent.

Respond ONLY with a JSON object:
{\"items\": [...], \"qualifications\": {...}, \"total\": null, \"unmapped\": []}";

/// Evidence block for the aggregation pass.
pub fn aggregation_block(division: &str, heuristic: &CandidateScopeList) -> String {
    format!(
        "Division: {division}\n\nCandidate scope lines ({} total):\n{}",
        heuristic.len(),
        heuristic.numbered()
    )
}

/// Header block naming the contractor and the numbered candidates.
pub fn candidates_block(evidence: &ContractorEvidence, list: &CandidateScopeList) -> String {
    format!(
        "Contractor: {}\n\nCandidate scope items ({}):\n{}",
        evidence.name,
        list.len(),
        list.numbered()
    )
}

/// Detected inclusion/exclusion/alternate lines, as a labelled block.
/// `None` when nothing was detected.
pub fn structured_qualifications_block(hints: &Qualifications) -> Option<String> {
    if hints.is_empty() {
        return None;
    }
    let mut out = String::from("Structured qualifications detected in the bid:\n");
    let sections: [(&str, &[String]); 6] = [
        ("Inclusions", &hints.includes),
        ("Exclusions", &hints.excludes),
        ("Allowances", &hints.allowances),
        ("Alternates", &hints.alternates),
        ("Payment terms", &hints.payment_terms),
        ("Notes", &hints.fine_print),
    ];
    for (label, lines) in sections {
        if lines.is_empty() {
            continue;
        }
        out.push_str(&format!("\n{label}:\n"));
        for line in lines {
            out.push_str(&format!("- {line}\n"));
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_block_lists_sections() {
        let hints = Qualifications {
            excludes: vec!["Ductwork: excluded, by others".into()],
            alternates: vec!["Deduct Alternate 1: controls $4,200".into()],
            ..Default::default()
        };
        let block = structured_qualifications_block(&hints).unwrap();
        assert!(block.contains("Exclusions:\n- Ductwork: excluded, by others"));
        assert!(block.contains("Alternates:"));
        assert!(!block.contains("Inclusions:"));
        assert!(structured_qualifications_block(&Qualifications::default()).is_none());
    }

    #[test]
    fn candidates_are_numbered() {
        let mut list = CandidateScopeList::new();
        list.push("Ductwork");
        list.push("Controls");
        let evidence = ContractorEvidence {
            contractor_id: "a".into(),
            name: "Acme Mechanical".into(),
            fragments: vec![],
        };
        let block = candidates_block(&evidence, &list);
        assert!(block.starts_with("Contractor: Acme Mechanical"));
        assert!(block.contains("1. Ductwork\n2. Controls"));
    }
}
