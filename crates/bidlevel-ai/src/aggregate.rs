//! Advisory oracle pass that consolidates the heuristic candidate list.

use bidlevel_core::scope::merge_proposals;
use bidlevel_core::{CandidateScopeList, ExtractionRules, RawProposal, ScopeDictionary};
use tracing::{info, warn};

use crate::json::parse_json_lenient;
use crate::oracle::{Oracle, OracleRequest, Purpose};
use crate::prompt::{aggregation_block, AGGREGATION_SYSTEM_PROMPT};
use crate::retry::{complete_with_retry, RetryPolicy};

/// Result of the aggregation pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub list: CandidateScopeList,
    /// Items the oracle proposed, before merging.
    pub proposed: usize,
    /// True when the heuristic list was used unchanged.
    pub fell_back: bool,
    pub tokens: u64,
}

impl Aggregation {
    fn fallback(heuristic: &CandidateScopeList, tokens: u64) -> Self {
        Self {
            list: heuristic.clone(),
            proposed: 0,
            fell_back: true,
            tokens,
        }
    }
}

/// Ask the oracle for a consolidated vocabulary and merge it with the
/// heuristic list. Never fails: any oracle problem yields the heuristic list.
pub async fn propose_scope(
    oracle: &dyn Oracle,
    division: &str,
    heuristic: &CandidateScopeList,
    dictionary: &ScopeDictionary,
    rules: &ExtractionRules,
    retry: &RetryPolicy,
    max_tokens: u32,
) -> Aggregation {
    if heuristic.is_empty() {
        return Aggregation::fallback(heuristic, 0);
    }

    let request = OracleRequest {
        purpose: Purpose::Aggregation,
        system: AGGREGATION_SYSTEM_PROMPT.to_string(),
        blocks: vec![aggregation_block(division, heuristic)],
        max_tokens,
    };
    let response = match complete_with_retry(oracle, &request, retry).await {
        Ok(response) => response,
        Err(e) => {
            warn!(division, error = %e, "scope aggregation failed; using heuristic candidates");
            return Aggregation::fallback(heuristic, 0);
        }
    };
    let tokens = response.tokens_used(&request);

    let proposal = RawProposal::from_value(parse_json_lenient(&response.text));
    if proposal.scope_items.is_empty() {
        warn!(division, "scope aggregation returned no items; using heuristic candidates");
        return Aggregation::fallback(heuristic, tokens);
    }

    let list = merge_proposals(&proposal.scope_items, heuristic, dictionary, rules);
    info!(
        division,
        proposed = proposal.scope_items.len(),
        heuristic = heuristic.len(),
        merged = list.len(),
        "scope aggregation merged"
    );
    Aggregation {
        list,
        proposed: proposal.scope_items.len(),
        fell_back: false,
        tokens,
    }
}
