use bidlevel_ai::OracleError;
use bidlevel_store::StoreError;
use thiserror::Error;

/// Why a job failed. The `Display` text becomes the job's `error` column.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Config(String),

    /// Empty or unreadable input, detected before any oracle call.
    #[error("{0}")]
    Data(String),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
