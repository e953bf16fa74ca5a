//! Oracle layer: the completion trait and its HTTP client, prompts, lenient
//! JSON recovery, rate-limit retry, the scope aggregation pass and the
//! per-contractor scorer.

pub mod aggregate;
mod error;
pub mod json;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;
pub mod oracle;
pub mod prompt;
pub mod retry;
pub mod scorer;

pub use aggregate::{propose_scope, Aggregation};
pub use error::{parse_http_error, OracleError};
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockOracle;
pub use oracle::{AnthropicConfig, AnthropicOracle, Oracle, OracleRequest, OracleResponse, Purpose};
pub use retry::{complete_with_retry, RetryPolicy};
pub use scorer::{ContractorScorer, PacingConfig, ScoreOutcome, ScorerConfig};
