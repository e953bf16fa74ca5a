//! Per-contractor scoring against the numbered candidate list.

use std::time::Duration;

use bidlevel_core::heuristics::ContractorCandidates;
use bidlevel_core::scoring::ContractorScoring;
use bidlevel_core::{CandidateScopeList, ContractorEvidence, ExtractionRules, RawScoring};
use tracing::{debug, info, warn};

use crate::error::OracleError;
use crate::json::parse_json_lenient;
use crate::oracle::{Oracle, OracleRequest, Purpose, DEFAULT_MAX_TOKENS};
use crate::prompt::{
    candidates_block, structured_qualifications_block, LENIENT_SCORING_SYSTEM_PROMPT,
    SCORING_SYSTEM_PROMPT,
};
use crate::retry::{complete_with_retry, RetryPolicy};

pub const DEFAULT_EVIDENCE_CHARS: usize = 160_000;
pub const DEFAULT_TOKENS_PER_MINUTE: u64 = 30_000;

/// Inter-contractor flow control against a per-minute token budget.
#[derive(Debug, Clone, PartialEq)]
pub struct PacingConfig {
    pub tokens_per_minute: u64,
    pub enabled: bool,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            tokens_per_minute: DEFAULT_TOKENS_PER_MINUTE,
            enabled: true,
        }
    }
}

impl PacingConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Time the consumed tokens "cost" against the per-minute budget.
    pub fn delay_for(&self, tokens: u64) -> Duration {
        if !self.enabled || self.tokens_per_minute == 0 || tokens == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(tokens as f64 / self.tokens_per_minute as f64 * 60.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScorerConfig {
    /// Ceiling on evidence characters sent per contractor.
    pub evidence_chars: usize,
    pub max_tokens: u32,
    pub retry: RetryPolicy,
    pub pacing: PacingConfig,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            evidence_chars: DEFAULT_EVIDENCE_CHARS,
            max_tokens: DEFAULT_MAX_TOKENS,
            retry: RetryPolicy::default(),
            pacing: PacingConfig::default(),
        }
    }
}

/// One contractor's scoring answer plus what it cost.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreOutcome {
    pub scoring: ContractorScoring,
    pub tokens: u64,
    /// True when the strict pass came back empty and the lenient pass answered.
    pub lenient: bool,
}

pub struct ContractorScorer<'a> {
    oracle: &'a dyn Oracle,
    rules: &'a ExtractionRules,
    config: &'a ScorerConfig,
}

impl<'a> ContractorScorer<'a> {
    pub fn new(oracle: &'a dyn Oracle, rules: &'a ExtractionRules, config: &'a ScorerConfig) -> Self {
        Self {
            oracle,
            rules,
            config,
        }
    }

    /// Fragment text with letterhead and contact lines removed, up to the budget.
    pub fn strict_evidence(&self, evidence: &ContractorEvidence) -> String {
        let mut budget = Budget::new(self.config.evidence_chars);
        for fragment in evidence.fragments.iter().filter(|f| !f.is_blank()) {
            let kept: Vec<&str> = fragment
                .raw_text
                .lines()
                .filter(|line| !line.trim().is_empty())
                .filter(|line| !self.rules.is_contact_noise(line))
                .collect();
            if kept.is_empty() {
                continue;
            }
            if !budget.push(&fragment.source_name, &kept.join("\n")) {
                break;
            }
        }
        budget.finish()
    }

    /// Unfiltered fragment text, up to the budget.
    pub fn lenient_evidence(&self, evidence: &ContractorEvidence) -> String {
        let mut budget = Budget::new(self.config.evidence_chars);
        for fragment in evidence.fragments.iter().filter(|f| !f.is_blank()) {
            if !budget.push(&fragment.source_name, &fragment.raw_text) {
                break;
            }
        }
        budget.finish()
    }

    /// Score one contractor. Tries the strict prompt, then once more with the
    /// lenient prompt and raw evidence if the strict answer has no items.
    pub async fn score(
        &self,
        evidence: &ContractorEvidence,
        list: &CandidateScopeList,
        extracted: &ContractorCandidates,
    ) -> Result<ScoreOutcome, OracleError> {
        let header = candidates_block(evidence, list);

        let mut blocks = vec![header.clone(), self.strict_evidence(evidence)];
        if let Some(structured) = structured_qualifications_block(&extracted.hints) {
            blocks.push(structured);
        }
        let (raw, mut tokens) = self.ask(Purpose::Scoring, SCORING_SYSTEM_PROMPT, blocks).await?;
        if !raw.items.is_empty() {
            info!(contractor = %evidence.contractor_id, items = raw.items.len(), tokens, "contractor scored");
            return Ok(self.outcome(evidence, raw, tokens, false));
        }

        warn!(contractor = %evidence.contractor_id, "strict scoring returned no items; retrying with lenient evidence");
        let blocks = vec![header, self.lenient_evidence(evidence)];
        let (raw, lenient_tokens) = self
            .ask(Purpose::LenientScoring, LENIENT_SCORING_SYSTEM_PROMPT, blocks)
            .await?;
        tokens += lenient_tokens;
        if raw.items.is_empty() {
            return Err(OracleError::EmptyAnswer {
                contractor_id: evidence.contractor_id.clone(),
            });
        }
        info!(contractor = %evidence.contractor_id, items = raw.items.len(), tokens, "contractor scored leniently");
        Ok(self.outcome(evidence, raw, tokens, true))
    }

    /// Sleep in proportion to the tokens just spent.
    pub async fn pace(&self, tokens: u64) {
        let delay = self.config.pacing.delay_for(tokens);
        if delay.is_zero() {
            return;
        }
        debug!(tokens, delay_ms = delay.as_millis() as u64, "pacing before next contractor");
        tokio::time::sleep(delay).await;
    }

    async fn ask(
        &self,
        purpose: Purpose,
        system: &str,
        blocks: Vec<String>,
    ) -> Result<(RawScoring, u64), OracleError> {
        let request = OracleRequest {
            purpose,
            system: system.to_string(),
            blocks,
            max_tokens: self.config.max_tokens,
        };
        let response = complete_with_retry(self.oracle, &request, &self.config.retry).await?;
        let tokens = response.tokens_used(&request);
        Ok((RawScoring::from_value(parse_json_lenient(&response.text)), tokens))
    }

    fn outcome(
        &self,
        evidence: &ContractorEvidence,
        raw: RawScoring,
        tokens: u64,
        lenient: bool,
    ) -> ScoreOutcome {
        ScoreOutcome {
            scoring: ContractorScoring {
                contractor_id: evidence.contractor_id.clone(),
                name: evidence.name.clone(),
                raw,
            },
            tokens,
            lenient,
        }
    }
}

/// Accumulates `=== source ===` sections until the character ceiling.
struct Budget {
    out: String,
    remaining: usize,
}

impl Budget {
    fn new(limit: usize) -> Self {
        Self {
            out: String::new(),
            remaining: limit,
        }
    }

    /// Append a section; false once the budget is spent.
    fn push(&mut self, source: &str, text: &str) -> bool {
        let section = format!("=== {source} ===\n{}\n\n", text.trim());
        let len = section.chars().count();
        if len <= self.remaining {
            self.out.push_str(&section);
            self.remaining -= len;
            return self.remaining > 0;
        }
        let clipped: String = section.chars().take(self.remaining).collect();
        self.out.push_str(&clipped);
        self.remaining = 0;
        false
    }

    fn finish(self) -> String {
        self.out.trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockOracle;
    use crate::oracle::OracleResponse;
    use bidlevel_core::EvidenceFragment;

    fn evidence() -> ContractorEvidence {
        ContractorEvidence {
            contractor_id: "a".into(),
            name: "Acme Mechanical".into(),
            fragments: vec![
                EvidenceFragment::new(
                    "acme.pdf p.1",
                    "Acme Mechanical\nPhone: (555) 123-4567\nScope:\nInstall ductwork throughout",
                ),
                EvidenceFragment::new("acme.pdf p.2", "   "),
            ],
        }
    }

    fn list() -> CandidateScopeList {
        let mut list = CandidateScopeList::new();
        list.push("Ductwork");
        list.push("Controls");
        list
    }

    fn config() -> ScorerConfig {
        ScorerConfig {
            retry: RetryPolicy {
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
                jitter: Duration::ZERO,
                ..Default::default()
            },
            pacing: PacingConfig::disabled(),
            ..Default::default()
        }
    }

    #[test]
    fn pacing_scales_with_budget() {
        let pacing = PacingConfig {
            tokens_per_minute: 30_000,
            enabled: true,
        };
        assert_eq!(pacing.delay_for(15_000), Duration::from_secs(30));
        assert_eq!(pacing.delay_for(0), Duration::ZERO);
        assert_eq!(PacingConfig::disabled().delay_for(15_000), Duration::ZERO);
    }

    #[test]
    fn strict_evidence_drops_contact_lines() {
        let rules = ExtractionRules::default();
        let config = config();
        let oracle = MockOracle::new();
        let scorer = ContractorScorer::new(&oracle, &rules, &config);
        let strict = scorer.strict_evidence(&evidence());
        assert!(strict.starts_with("=== acme.pdf p.1 ==="));
        assert!(strict.contains("Install ductwork throughout"));
        assert!(!strict.contains("555"));
        assert!(!strict.contains("p.2"));
        assert!(scorer.lenient_evidence(&evidence()).contains("555"));
    }

    #[test]
    fn evidence_respects_budget() {
        let rules = ExtractionRules::default();
        let config = ScorerConfig {
            evidence_chars: 40,
            ..config()
        };
        let oracle = MockOracle::new();
        let scorer = ContractorScorer::new(&oracle, &rules, &config);
        let mut ev = evidence();
        ev.fragments.push(EvidenceFragment::new("other.pdf p.1", "Controls included"));
        let strict = scorer.strict_evidence(&ev);
        assert!(strict.chars().count() <= 40);
        assert!(!strict.contains("other.pdf"));
    }

    #[tokio::test]
    async fn strict_answer_is_used() {
        let rules = ExtractionRules::default();
        let config = config();
        let oracle = MockOracle::new();
        oracle.push(Ok(OracleResponse {
            text: r#"{"items": [{"candidate_index": 1, "status": "included", "evidence": "Install ductwork throughout"}]}"#.into(),
            input_tokens: 900,
            output_tokens: 100,
        }));
        let scorer = ContractorScorer::new(&oracle, &rules, &config);
        let extracted = ContractorCandidates {
            contractor_id: "a".into(),
            hints: bidlevel_core::Qualifications {
                excludes: vec!["Controls by others".into()],
                ..Default::default()
            },
            ..Default::default()
        };
        let out = scorer.score(&evidence(), &list(), &extracted).await.unwrap();
        assert!(!out.lenient);
        assert_eq!(out.tokens, 1000);
        assert_eq!(out.scoring.raw.items.len(), 1);
        assert_eq!(out.scoring.name, "Acme Mechanical");

        let request = &oracle.requests()[0];
        assert_eq!(request.purpose, Purpose::Scoring);
        assert_eq!(request.blocks.len(), 3);
        assert!(request.blocks[2].contains("Controls by others"));
    }

    #[tokio::test]
    async fn empty_strict_answer_triggers_lenient_retry() {
        let rules = ExtractionRules::default();
        let config = config();
        let oracle = MockOracle::new();
        oracle.push_text("{\"items\": []}");
        oracle.push_text("```json\n{\"items\": [{\"candidate_index\": 2, \"status\": \"excluded\"}]}\n```");
        let scorer = ContractorScorer::new(&oracle, &rules, &config);
        let out = scorer
            .score(&evidence(), &list(), &ContractorCandidates::default())
            .await
            .unwrap();
        assert!(out.lenient);
        assert_eq!(oracle.call_count(), 2);
        let requests = oracle.requests();
        assert_eq!(requests[1].purpose, Purpose::LenientScoring);
        assert!(requests[1].blocks[1].contains("555"));
    }

    #[tokio::test]
    async fn nothing_usable_is_an_error() {
        let rules = ExtractionRules::default();
        let config = config();
        let oracle = MockOracle::new();
        oracle.push_text("no idea");
        oracle.push_text("still no idea");
        let scorer = ContractorScorer::new(&oracle, &rules, &config);
        let err = scorer
            .score(&evidence(), &list(), &ContractorCandidates::default())
            .await
            .unwrap_err();
        assert!(matches!(err, OracleError::EmptyAnswer { ref contractor_id } if contractor_id == "a"));
    }

    #[tokio::test]
    async fn rate_limit_is_retried_inside_scoring() {
        let rules = ExtractionRules::default();
        let config = config();
        let oracle = MockOracle::new();
        oracle.push_rate_limited();
        oracle.push_text(r#"{"items": [{"candidate_index": 1, "status": "included"}]}"#);
        let scorer = ContractorScorer::new(&oracle, &rules, &config);
        let out = scorer
            .score(&evidence(), &list(), &ContractorCandidates::default())
            .await
            .unwrap();
        assert_eq!(out.scoring.raw.items.len(), 1);
        assert_eq!(oracle.call_count(), 2);
    }
}
