use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("oracle not configured: {0}")]
    MissingCredentials(String),

    #[error("oracle rejected credentials: {0}")]
    Authentication(String),

    #[error("oracle rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after: Option<Duration>,
    },

    #[error("oracle still rate limited after {attempts} attempts: {message}")]
    RetriesExhausted { attempts: u32, message: String },

    #[error("invalid oracle request: {0}")]
    InvalidRequest(String),

    #[error("oracle server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("could not parse oracle response: {0}")]
    Parse(String),

    #[error("oracle returned no scored items for contractor {contractor_id}, even with lenient evidence")]
    EmptyAnswer { contractor_id: String },

    #[error("{0}")]
    Other(String),
}

impl OracleError {
    /// Only rate limiting is retried; everything else fails the job at once.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Configuration problems that no retry can fix.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::MissingCredentials(_) | Self::Authentication(_))
    }
}

/// Map a non-success HTTP status onto an error class.
pub fn parse_http_error(status: u16, body: &str, retry_after: Option<Duration>) -> OracleError {
    match status {
        401 | 403 => OracleError::Authentication(body.to_string()),
        // 529 is the provider's "overloaded" answer; it clears the same way 429 does.
        429 | 529 => OracleError::RateLimited {
            message: body.to_string(),
            retry_after,
        },
        400 | 404 | 413 | 422 => OracleError::InvalidRequest(body.to_string()),
        500..=599 => OracleError::Server {
            status,
            message: body.to_string(),
        },
        _ => OracleError::Other(format!("HTTP {status}: {body}")),
    }
}
