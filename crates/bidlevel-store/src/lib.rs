//! Storage layer: DuckDB for bids, jobs and reports; filesystem for raw documents.

mod documents;
mod error;
mod extract;
mod extractor;

pub use documents::{DocumentStore, FsDocumentStore};
pub use error::StoreError;
pub use extract::{extract_document, DocumentKind, ExtractedDocument, ExtractedPage, SheetText};
pub use extractor::RemoteExtractor;

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::{Bid, BidDocument, DuckStore, StoredReport};
