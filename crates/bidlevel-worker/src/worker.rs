use std::sync::Arc;
use std::time::Duration;

use bidlevel_ai::{propose_scope, ContractorScorer, Oracle};
use bidlevel_core::job::batch_progress;
use bidlevel_core::scope::build_candidate_list;
use bidlevel_core::{
    merge_report, ClaimedJob, ContractorCandidates, ContractorEvidence, ContractorResult,
    DictionaryRegistry, ExtractionRules, JobStatus, LevelingReport, RawScoring, Reconciler,
};
use bidlevel_store::{
    extract_document, DocumentKind, DocumentStore, DuckStore, ExtractedDocument, RemoteExtractor,
    StoreError,
};
use tracing::{info, warn};

use crate::config::{PdfExtractor, PipelineConfig};
use crate::error::PipelineError;

/// Progress once the candidate list is fixed; scoring fills the span up to
/// `SCORED_PROGRESS`.
const CANDIDATES_PROGRESS: u8 = 10;
const SCORED_PROGRESS: u8 = 90;
const MERGED_PROGRESS: u8 = 95;

/// How a claimed job ended.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    pub job_id: String,
    pub division: String,
    pub status: JobStatus,
    pub error: Option<String>,
    pub report_id: Option<String>,
}

/// Processes one queued job at a time, end to end.
pub struct Worker {
    store: Arc<DuckStore>,
    documents: Arc<dyn DocumentStore>,
    oracle: Arc<dyn Oracle>,
    config: PipelineConfig,
    registry: DictionaryRegistry,
    rules: ExtractionRules,
}

/// Evidence loaded for one bid, plus how many documents it had.
struct LoadedBid {
    evidence: ContractorEvidence,
    documents: usize,
}

impl Worker {
    pub fn new(
        store: Arc<DuckStore>,
        documents: Arc<dyn DocumentStore>,
        oracle: Arc<dyn Oracle>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            documents,
            oracle,
            config,
            registry: DictionaryRegistry::bundled(),
            rules: ExtractionRules::default(),
        }
    }

    pub fn with_registry(mut self, registry: DictionaryRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_rules(mut self, rules: ExtractionRules) -> Self {
        self.rules = rules;
        self
    }

    /// Claim and run the oldest queued job. `Ok(None)` when the queue is empty.
    ///
    /// Pipeline failures are recorded on the job and reported in the outcome;
    /// only bookkeeping failures come back as `Err`.
    pub async fn run_once(&self) -> Result<Option<JobOutcome>, PipelineError> {
        let Some(job) = self.store.claim_next_job()? else {
            return Ok(None);
        };
        info!(job_id = %job.job_id, division = %job.division, "claimed job");

        match self.process(&job).await {
            Ok(report_id) => Ok(Some(JobOutcome {
                job_id: job.job_id,
                division: job.division,
                status: JobStatus::Success,
                error: None,
                report_id: Some(report_id),
            })),
            Err(e) => {
                let message = e.to_string();
                self.store.finish_job_failed(&job.job_id, &message)?;
                Ok(Some(JobOutcome {
                    job_id: job.job_id,
                    division: job.division,
                    status: JobStatus::Failed,
                    error: Some(message),
                    report_id: None,
                }))
            }
        }
    }

    /// Poll the queue forever, sleeping `poll_interval` whenever it is empty.
    pub async fn run_forever(&self, poll_interval: Duration) {
        info!(poll_ms = poll_interval.as_millis() as u64, "worker started");
        loop {
            match self.run_once().await {
                Ok(Some(outcome)) => {
                    info!(job_id = %outcome.job_id, status = %outcome.status, "job done");
                }
                Ok(None) => tokio::time::sleep(poll_interval).await,
                Err(e) => {
                    warn!(error = %e, "worker iteration failed");
                    tokio::time::sleep(poll_interval).await;
                }
            }
        }
    }

    // ── Pipeline ──

    /// Run every stage for a claimed job. The report is saved and the job
    /// marked successful together; any failure before that leaves no report.
    async fn process(&self, job: &ClaimedJob) -> Result<String, PipelineError> {
        let remote = self.preflight()?;
        let division = job.division.as_str();

        let bids = self.store.bids_for_division(division)?;
        if bids.is_empty() {
            return Err(PipelineError::Data(format!(
                "No bids found for division {division}"
            )));
        }

        let mut loaded = Vec::with_capacity(bids.len());
        for bid in &bids {
            loaded.push(self.load_bid(bid, remote.as_ref()).await?);
        }
        let document_count: usize = loaded.iter().map(|b| b.documents).sum();
        if document_count == 0 {
            return Err(PipelineError::Data(format!(
                "No documents found for division {division} ({} bids)",
                bids.len()
            )));
        }
        if !loaded.iter().any(|b| b.evidence.has_text()) {
            return Err(PipelineError::Data(format!(
                "No readable content extracted from {document_count} documents for division {division}"
            )));
        }
        let evidence: Vec<ContractorEvidence> = loaded.into_iter().map(|b| b.evidence).collect();

        // Candidate scope list
        let dictionary = self.registry.for_division(division);
        let harvests: Vec<ContractorCandidates> = evidence
            .iter()
            .map(|e| self.rules.harvest(&e.contractor_id, &e.fragments))
            .collect();
        let heuristic = build_candidate_list(&harvests, &dictionary);
        let scorer = ContractorScorer::new(self.oracle.as_ref(), &self.rules, &self.config.scorer);
        let list = if self.config.aggregate {
            let aggregation = propose_scope(
                self.oracle.as_ref(),
                division,
                &heuristic,
                &dictionary,
                &self.rules,
                &self.config.scorer.retry,
                self.config.aggregation_max_tokens,
            )
            .await;
            scorer.pace(aggregation.tokens).await;
            aggregation.list
        } else {
            heuristic
        };
        if list.is_empty() {
            return Err(PipelineError::Data(format!(
                "No candidate scope items could be extracted for division {division}"
            )));
        }
        info!(job_id = %job.job_id, items = list.len(), contractors = evidence.len(), "candidate scope list ready");

        // Scoring and reconciliation, one contractor at a time
        let scorable = evidence.iter().filter(|e| e.has_text()).count() as u32;
        self.store.set_batches_total(&job.job_id, scorable)?;
        self.store
            .update_job_progress(&job.job_id, 0, CANDIDATES_PROGRESS)?;

        let reconciler = Reconciler::new(&list, &dictionary);
        let mut results = Vec::with_capacity(evidence.len());
        let mut done = 0u32;
        for (contractor, extracted) in evidence.iter().zip(&harvests) {
            if !contractor.has_text() {
                warn!(contractor = %contractor.contractor_id, "no readable content; every item left not specified");
                results.push(ContractorResult {
                    contractor_id: contractor.contractor_id.clone(),
                    name: contractor.name.clone(),
                    reconciled: reconciler.reconcile(&RawScoring::default(), extracted),
                });
                continue;
            }

            let outcome = scorer.score(contractor, &list, extracted).await?;
            let reconciled = reconciler.reconcile(&outcome.scoring.raw, extracted);
            info!(
                contractor = %contractor.contractor_id,
                unmapped = reconciled.unmapped.len(),
                lenient = outcome.lenient,
                "contractor reconciled"
            );
            results.push(ContractorResult {
                contractor_id: contractor.contractor_id.clone(),
                name: contractor.name.clone(),
                reconciled,
            });

            done += 1;
            let progress = batch_progress(done, scorable, CANDIDATES_PROGRESS, SCORED_PROGRESS);
            self.store.update_job_progress(&job.job_id, done, progress)?;
            if done < scorable {
                scorer.pace(outcome.tokens).await;
            }
        }

        let report = merge_report(&list, &results);
        self.store
            .update_job_progress(&job.job_id, done, MERGED_PROGRESS)?;
        let report_id = self.save(job, &report)?;
        Ok(report_id)
    }

    /// Configuration checks that must pass before any document is read.
    fn preflight(&self) -> Result<Option<RemoteExtractor>, PipelineError> {
        self.oracle
            .check_config()
            .map_err(|e| PipelineError::Config(e.to_string()))?;
        match (self.config.pdf_extractor, &self.config.extractor_url) {
            (PdfExtractor::Local, _) => Ok(None),
            (PdfExtractor::Remote, Some(url)) if !url.trim().is_empty() => {
                Ok(Some(RemoteExtractor::new(url.clone())))
            }
            (PdfExtractor::Remote, _) => Err(PipelineError::Config(
                "PDF extractor is set to remote but BIDLEVEL_EXTRACTOR_URL is not set".to_string(),
            )),
        }
    }

    /// Fetch and extract up to `max_docs_per_bid` documents for one bid.
    /// Unsupported or unreadable documents are skipped.
    async fn load_bid(
        &self,
        bid: &bidlevel_store::Bid,
        remote: Option<&RemoteExtractor>,
    ) -> Result<LoadedBid, PipelineError> {
        let documents = self
            .store
            .documents_for_bid(&bid.bid_id, self.config.max_docs_per_bid)?;
        let mut evidence = ContractorEvidence {
            contractor_id: bid.contractor_id.clone(),
            name: bid.contractor_name.clone(),
            fragments: Vec::new(),
        };
        for document in &documents {
            let bytes = match self.documents.fetch(&document.storage_ref).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!(filename = %document.filename, error = %e, "could not fetch document; skipping");
                    continue;
                }
            };
            match self.extract(&bytes, &document.filename, remote).await {
                Ok(extracted) => evidence.fragments.extend(extracted.fragments()),
                Err(e) => {
                    warn!(filename = %document.filename, error = %e, "could not extract document; skipping");
                }
            }
        }
        info!(
            contractor = %evidence.contractor_id,
            documents = documents.len(),
            fragments = evidence.fragments.len(),
            chars = evidence.text_len(),
            "bid evidence loaded"
        );
        Ok(LoadedBid {
            evidence,
            documents: documents.len(),
        })
    }

    async fn extract(
        &self,
        bytes: &[u8],
        filename: &str,
        remote: Option<&RemoteExtractor>,
    ) -> Result<ExtractedDocument, StoreError> {
        match (remote, DocumentKind::from_filename(filename)) {
            (Some(remote), Some(DocumentKind::Pdf)) => remote.extract(bytes, filename).await,
            _ => extract_document(bytes, filename),
        }
    }

    fn save(&self, job: &ClaimedJob, report: &LevelingReport) -> Result<String, PipelineError> {
        let report_id = self
            .store
            .complete_job(&job.job_id, &job.division, report)?;
        info!(
            job_id = %job.job_id,
            items = report.scope_items.len(),
            contractors = report.contractors.len(),
            cells = report.cell_count(),
            "report saved"
        );
        Ok(report_id)
    }
}
