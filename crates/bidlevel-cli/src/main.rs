mod display;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use bidlevel_ai::oracle::{ANTHROPIC_API_URL, DEFAULT_MAX_TOKENS, DEFAULT_MODEL};
use bidlevel_ai::scorer::{DEFAULT_EVIDENCE_CHARS, DEFAULT_TOKENS_PER_MINUTE};
use bidlevel_ai::{AnthropicConfig, AnthropicOracle, Oracle, PacingConfig, ScorerConfig};
use bidlevel_core::scope::build_candidate_list;
use bidlevel_core::{DictionaryRegistry, ExtractionRules};
use bidlevel_store::{extract_document, DocumentStore, DuckStore, FsDocumentStore};
use bidlevel_worker::{PdfExtractor, PipelineConfig, Worker, DEFAULT_MAX_DOCS_PER_BID};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{info, warn};

const LIST_DOCS_LIMIT: usize = 1_000;

#[derive(Parser)]
#[command(name = "bidlevel", version, about = "Level subcontractor bids into a scope matrix")]
struct Cli {
    /// DuckDB database file
    #[arg(long, env = "BIDLEVEL_DB", default_value = "bidlevel.duckdb", global = true)]
    db: PathBuf,

    /// Directory holding imported bid documents
    #[arg(long, env = "BIDLEVEL_DOCS", default_value = "bid-docs", global = true)]
    docs: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register bids and attach documents
    Bid {
        #[command(subcommand)]
        command: BidCommand,
    },
    /// Queue a leveling job for a division
    Enqueue {
        #[arg(long)]
        division: String,
    },
    /// Run the worker
    Work(WorkArgs),
    /// Show one job, or the most recent jobs
    Status {
        job_id: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Print the latest report for a division
    Report {
        #[arg(long)]
        division: String,
        /// Raw JSON instead of the matrix view
        #[arg(long)]
        json: bool,
    },
    /// Preview the heuristic candidate list for a division (no oracle call)
    Candidates {
        #[arg(long)]
        division: String,
        #[arg(long, env = "BIDLEVEL_MAX_DOCS_PER_BID", default_value_t = DEFAULT_MAX_DOCS_PER_BID)]
        max_docs_per_bid: usize,
    },
}

#[derive(Subcommand)]
enum BidCommand {
    /// Register a contractor's bid, importing any documents given
    Add {
        #[arg(long)]
        division: String,
        #[arg(long)]
        contractor_id: String,
        #[arg(long)]
        name: String,
        files: Vec<PathBuf>,
    },
    /// Attach documents to an existing bid
    Attach { bid_id: String, files: Vec<PathBuf> },
    /// List bids for a division
    List {
        #[arg(long)]
        division: String,
    },
}

#[derive(Args)]
struct WorkArgs {
    /// Process one job and exit
    #[arg(long)]
    once: bool,
    /// Seconds between polls of an empty queue
    #[arg(long, default_value_t = 5)]
    poll_secs: u64,

    #[arg(long, env = "BIDLEVEL_ORACLE_URL", default_value = ANTHROPIC_API_URL)]
    oracle_url: String,
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    #[arg(long, env = "BIDLEVEL_MODEL", default_value = DEFAULT_MODEL)]
    model: String,
    #[arg(long, env = "BIDLEVEL_MAX_TOKENS", default_value_t = DEFAULT_MAX_TOKENS)]
    max_tokens: u32,
    /// Pacing budget; 0 disables pacing
    #[arg(long, env = "BIDLEVEL_TOKENS_PER_MINUTE", default_value_t = DEFAULT_TOKENS_PER_MINUTE)]
    tokens_per_minute: u64,
    /// Evidence characters sent per contractor
    #[arg(long, env = "BIDLEVEL_EVIDENCE_CHARS", default_value_t = DEFAULT_EVIDENCE_CHARS)]
    evidence_chars: usize,
    #[arg(long, env = "BIDLEVEL_MAX_DOCS_PER_BID", default_value_t = DEFAULT_MAX_DOCS_PER_BID)]
    max_docs_per_bid: usize,
    #[arg(long, env = "BIDLEVEL_PDF_EXTRACTOR", value_enum, default_value_t = PdfExtractorArg::Local)]
    pdf_extractor: PdfExtractorArg,
    #[arg(long, env = "BIDLEVEL_EXTRACTOR_URL")]
    extractor_url: Option<String>,
    /// Skip the oracle pass that consolidates the candidate list
    #[arg(long)]
    no_aggregate: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum PdfExtractorArg {
    Local,
    Remote,
}

impl WorkArgs {
    fn pipeline_config(&self) -> PipelineConfig {
        let scorer = ScorerConfig {
            evidence_chars: self.evidence_chars,
            max_tokens: self.max_tokens,
            pacing: PacingConfig {
                tokens_per_minute: self.tokens_per_minute,
                enabled: self.tokens_per_minute > 0,
            },
            ..Default::default()
        };
        PipelineConfig {
            max_docs_per_bid: self.max_docs_per_bid,
            aggregate: !self.no_aggregate,
            pdf_extractor: match self.pdf_extractor {
                PdfExtractorArg::Local => PdfExtractor::Local,
                PdfExtractorArg::Remote => PdfExtractor::Remote,
            },
            extractor_url: self.extractor_url.clone(),
            scorer,
            ..Default::default()
        }
    }

    fn oracle_config(&self) -> AnthropicConfig {
        AnthropicConfig {
            endpoint: self.oracle_url.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    info!("bidlevel v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let store = DuckStore::open_persistent(&cli.db)
        .with_context(|| format!("opening database {}", cli.db.display()))?;
    let documents = FsDocumentStore::new(&cli.docs);

    match cli.command {
        Commands::Bid { command } => run_bid(command, &store, &documents).await,
        Commands::Enqueue { division } => {
            let meta = serde_json::json!({ "source": "cli" });
            let job = store.enqueue_job(&division, &meta)?;
            println!("{}", job.job_id);
            Ok(())
        }
        Commands::Work(args) => run_worker(args, store, documents).await,
        Commands::Status { job_id, limit } => {
            match job_id {
                Some(id) => display::print_job_card(&store.get_job(&id)?),
                None => display::print_job_table(&store.list_jobs(limit)?),
            }
            Ok(())
        }
        Commands::Report { division, json } => {
            let Some(stored) = store.latest_report(&division)? else {
                eprintln!("no report found for division {division}");
                return Ok(());
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&stored.report)?);
            } else {
                display::print_report(&stored);
            }
            Ok(())
        }
        Commands::Candidates {
            division,
            max_docs_per_bid,
        } => preview_candidates(&division, max_docs_per_bid, &store, &documents).await,
    }
}

async fn run_bid(
    command: BidCommand,
    store: &DuckStore,
    documents: &FsDocumentStore,
) -> anyhow::Result<()> {
    match command {
        BidCommand::Add {
            division,
            contractor_id,
            name,
            files,
        } => {
            let bid = store.add_bid(&division, &contractor_id, &name)?;
            attach(store, documents, &bid.bid_id, &files).await?;
            println!("{}", bid.bid_id);
        }
        BidCommand::Attach { bid_id, files } => {
            if files.is_empty() {
                bail!("no files given");
            }
            attach(store, documents, &bid_id, &files).await?;
        }
        BidCommand::List { division } => {
            for bid in store.bids_for_division(&division)? {
                let docs = store.documents_for_bid(&bid.bid_id, LIST_DOCS_LIMIT)?;
                println!(
                    "{}  {:<16} {:<30} {} docs",
                    bid.bid_id,
                    bid.contractor_id,
                    bid.contractor_name,
                    docs.len()
                );
            }
        }
    }
    Ok(())
}

async fn attach(
    store: &DuckStore,
    documents: &FsDocumentStore,
    bid_id: &str,
    files: &[PathBuf],
) -> anyhow::Result<()> {
    for path in files {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("no filename in {}", path.display()))?;
        let storage_ref = documents
            .import(path)
            .await
            .with_context(|| format!("importing {}", path.display()))?;
        store.add_bid_document(bid_id, filename, &storage_ref)?;
    }
    Ok(())
}

async fn run_worker(args: WorkArgs, store: DuckStore, documents: FsDocumentStore) -> anyhow::Result<()> {
    let oracle = AnthropicOracle::new(args.oracle_config())?;
    if let Err(e) = oracle.check_config() {
        warn!(error = %e, "oracle is not configured; jobs will fail until it is");
    }
    let worker = Worker::new(
        Arc::new(store),
        Arc::new(documents),
        Arc::new(oracle),
        args.pipeline_config(),
    );

    if args.once {
        match worker.run_once().await? {
            Some(outcome) => {
                println!("{} {}", outcome.job_id, outcome.status);
                if let Some(error) = outcome.error {
                    eprintln!("error: {error}");
                }
            }
            None => println!("queue empty"),
        }
        return Ok(());
    }
    worker.run_forever(Duration::from_secs(args.poll_secs)).await;
    Ok(())
}

async fn preview_candidates(
    division: &str,
    max_docs_per_bid: usize,
    store: &DuckStore,
    documents: &FsDocumentStore,
) -> anyhow::Result<()> {
    let rules = ExtractionRules::default();
    let dictionary = DictionaryRegistry::bundled().for_division(division);
    let mut harvests = Vec::new();
    for bid in store.bids_for_division(division)? {
        let mut fragments = Vec::new();
        for doc in store.documents_for_bid(&bid.bid_id, max_docs_per_bid)? {
            let bytes = documents.fetch(&doc.storage_ref).await?;
            match extract_document(&bytes, &doc.filename) {
                Ok(extracted) => fragments.extend(extracted.fragments()),
                Err(e) => warn!(filename = %doc.filename, error = %e, "skipping document"),
            }
        }
        harvests.push(rules.harvest(&bid.contractor_id, &fragments));
    }
    let list = build_candidate_list(&harvests, &dictionary);
    if list.is_empty() {
        eprintln!("no candidates found for division {division}");
        return Ok(());
    }
    println!("{}", list.numbered());
    Ok(())
}
