pub mod dictionary;
mod error;
pub mod fuzzy;
pub mod heuristics;
pub mod job;
pub mod merge;
pub mod model;
pub mod reconcile;
pub mod scope;
pub mod scoring;
pub mod text;

pub use dictionary::{DictionaryRegistry, ScopeDictionary};
pub use error::CoreError;
pub use heuristics::{ContractorCandidates, ExtractionRules};
pub use job::{ClaimedJob, JobStatus, ProcessingJob};
pub use merge::{merge_report, ContractorResult};
pub use model::{
    ContractorEvidence, EvidenceFragment, LevelingReport, MatrixCell, Qualifications,
    ScopeStatus, ScoredItem,
};
pub use reconcile::{ReconciledContractor, Reconciler};
pub use scope::CandidateScopeList;
pub use scoring::{RawProposal, RawScoring};
