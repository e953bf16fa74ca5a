use std::time::Duration;

use rand::Rng;
use tracing::warn;

use crate::error::OracleError;
use crate::oracle::{Oracle, OracleRequest, OracleResponse};

/// Exponential backoff for rate-limited oracle calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound of the random extra added to each delay.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 4,
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(16),
            jitter: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (1-based), without jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let extra = if jitter_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter_ms)
        };
        self.base_delay(attempt) + Duration::from_millis(extra)
    }
}

/// Call the oracle, retrying only rate-limit errors.
///
/// A server-suggested `retry-after` wins over the computed backoff when it is
/// longer. Any other error is returned at once.
pub async fn complete_with_retry(
    oracle: &dyn Oracle,
    request: &OracleRequest,
    policy: &RetryPolicy,
) -> Result<OracleResponse, OracleError> {
    let mut last_message = String::new();
    for attempt in 0..=policy.max_retries {
        match oracle.complete(request.clone()).await {
            Ok(response) => return Ok(response),
            Err(OracleError::RateLimited {
                message,
                retry_after,
            }) => {
                last_message = message;
                if attempt == policy.max_retries {
                    break;
                }
                let mut backoff = policy.delay_for(attempt + 1);
                if let Some(hint) = retry_after {
                    backoff = backoff.max(hint.min(policy.max_delay));
                }
                warn!(
                    attempt = attempt + 1,
                    backoff_ms = backoff.as_millis() as u64,
                    purpose = ?request.purpose,
                    "oracle rate limited; retrying after backoff"
                );
                tokio::time::sleep(backoff).await;
            }
            Err(other) => return Err(other),
        }
    }
    Err(OracleError::RetriesExhausted {
        attempts: policy.max_retries + 1,
        message: last_message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockOracle;
    use crate::oracle::Purpose;

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_retries: 4,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
            jitter: Duration::ZERO,
        }
    }

    fn request() -> OracleRequest {
        OracleRequest {
            purpose: Purpose::Scoring,
            system: "s".into(),
            blocks: vec!["b".into()],
            max_tokens: 10,
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let p = RetryPolicy::default();
        assert_eq!(p.base_delay(1), Duration::from_secs(2));
        assert_eq!(p.base_delay(2), Duration::from_secs(4));
        assert_eq!(p.base_delay(3), Duration::from_secs(8));
        assert_eq!(p.base_delay(4), Duration::from_secs(16));
        assert_eq!(p.base_delay(9), Duration::from_secs(16));
        let d = p.delay_for(1);
        assert!(d >= Duration::from_secs(2) && d <= Duration::from_millis(2500));
    }

    #[tokio::test]
    async fn three_rate_limits_then_success() {
        let oracle = MockOracle::new();
        for _ in 0..3 {
            oracle.push_rate_limited();
        }
        oracle.push_text("{\"items\": []}");
        let response = complete_with_retry(&oracle, &request(), &fast()).await.unwrap();
        assert_eq!(response.text, "{\"items\": []}");
        assert_eq!(oracle.call_count(), 4);
    }

    #[tokio::test]
    async fn gives_up_after_cap() {
        let oracle = MockOracle::new();
        for _ in 0..6 {
            oracle.push_rate_limited();
        }
        let err = complete_with_retry(&oracle, &request(), &fast()).await.unwrap_err();
        assert!(matches!(err, OracleError::RetriesExhausted { attempts: 5, .. }));
        assert_eq!(oracle.call_count(), 5);
    }

    #[tokio::test]
    async fn other_errors_are_not_retried() {
        let oracle = MockOracle::new();
        oracle.push_error(OracleError::Server {
            status: 500,
            message: "boom".into(),
        });
        oracle.push_text("{}");
        let err = complete_with_retry(&oracle, &request(), &fast()).await.unwrap_err();
        assert!(matches!(err, OracleError::Server { status: 500, .. }));
        assert_eq!(oracle.call_count(), 1);
    }
}
