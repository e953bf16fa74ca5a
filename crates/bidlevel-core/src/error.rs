use thiserror::Error;

use crate::job::JobStatus;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown scope status: {0}")]
    UnknownStatus(String),

    #[error("unknown job status: {0}")]
    UnknownJobStatus(String),

    #[error("invalid job transition: {from} -> {to}")]
    InvalidTransition { from: JobStatus, to: JobStatus },

    #[error("invalid extraction rule {pattern:?}: {source}")]
    InvalidRule {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}
