use bidlevel_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no results for query")]
    NoResults,

    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("bid not found: {0}")]
    BidNotFound(String),

    #[error("job {job_id} changed state concurrently")]
    Conflict { job_id: String },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[cfg(feature = "duckdb")]
    #[error("duckdb error: {0}")]
    DuckDb(#[from] ::duckdb::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported document type: {0}")]
    Unsupported(String),

    #[error("could not extract {filename}: {reason}")]
    Extraction { filename: String, reason: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("extractor returned {status}: {body}")]
    Extractor { status: u16, body: String },

    #[error("{0}")]
    Other(String),
}
