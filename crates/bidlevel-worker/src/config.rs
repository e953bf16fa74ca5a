use bidlevel_ai::ScorerConfig;

pub const DEFAULT_MAX_DOCS_PER_BID: usize = 12;
pub const DEFAULT_AGGREGATION_MAX_TOKENS: u32 = 4096;

/// Which extractor handles PDFs. Other formats are always extracted locally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PdfExtractor {
    #[default]
    Local,
    Remote,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub max_docs_per_bid: usize,
    /// Run the advisory oracle pass over the heuristic candidates.
    pub aggregate: bool,
    pub aggregation_max_tokens: u32,
    pub pdf_extractor: PdfExtractor,
    pub extractor_url: Option<String>,
    pub scorer: ScorerConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_docs_per_bid: DEFAULT_MAX_DOCS_PER_BID,
            aggregate: true,
            aggregation_max_tokens: DEFAULT_AGGREGATION_MAX_TOKENS,
            pdf_extractor: PdfExtractor::Local,
            extractor_url: None,
            scorer: ScorerConfig::default(),
        }
    }
}
