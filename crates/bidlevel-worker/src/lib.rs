//! Job worker: claims the oldest queued leveling job and runs it end to end.
//!
//! Stages run in order: evidence loading, candidate scope extraction, the
//! advisory aggregation pass, sequential per-contractor scoring with
//! reconciliation, then the report merge. A job is marked `success` only after
//! its report is saved; any earlier failure marks it `failed` with a readable
//! error and no report.

mod config;
mod error;
mod worker;

pub use config::{PdfExtractor, PipelineConfig, DEFAULT_MAX_DOCS_PER_BID};
pub use error::PipelineError;
pub use worker::{JobOutcome, Worker};
