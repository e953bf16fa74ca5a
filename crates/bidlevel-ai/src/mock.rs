//! In-process oracle for tests: scripted answers, an optional handler, and a
//! record of every request.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::OracleError;
use crate::oracle::{Oracle, OracleRequest, OracleResponse};

type Handler = Box<dyn Fn(&OracleRequest) -> Result<OracleResponse, OracleError> + Send + Sync>;

/// Scripted responses are consumed first; after that the handler (if any)
/// answers every call.
#[derive(Default)]
pub struct MockOracle {
    script: Mutex<VecDeque<Result<OracleResponse, OracleError>>>,
    handler: Option<Handler>,
    requests: Mutex<Vec<OracleRequest>>,
    config_error: Option<String>,
}

impl MockOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&OracleRequest) -> Result<OracleResponse, OracleError> + Send + Sync + 'static,
    {
        Self {
            handler: Some(Box::new(handler)),
            ..Default::default()
        }
    }

    /// A mock whose `check_config` fails with missing credentials.
    pub fn unconfigured(message: &str) -> Self {
        Self {
            config_error: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub fn push(&self, result: Result<OracleResponse, OracleError>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(result);
        }
    }

    pub fn push_text(&self, text: &str) {
        self.push(Ok(OracleResponse::text(text)));
    }

    pub fn push_error(&self, error: OracleError) {
        self.push(Err(error));
    }

    pub fn push_rate_limited(&self) {
        self.push_error(OracleError::RateLimited {
            message: "429 Too Many Requests".into(),
            retry_after: None,
        });
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn requests(&self) -> Vec<OracleRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Oracle for MockOracle {
    async fn complete(&self, request: OracleRequest) -> Result<OracleResponse, OracleError> {
        let scripted = self
            .script
            .lock()
            .map_err(|e| OracleError::Other(format!("mutex poisoned: {e}")))?
            .pop_front();
        let result = match (scripted, &self.handler) {
            (Some(result), _) => result,
            (None, Some(handler)) => handler(&request),
            (None, None) => Err(OracleError::Other("mock oracle has no scripted response".into())),
        };
        self.requests
            .lock()
            .map_err(|e| OracleError::Other(format!("mutex poisoned: {e}")))?
            .push(request);
        result
    }

    fn check_config(&self) -> Result<(), OracleError> {
        match &self.config_error {
            Some(message) => Err(OracleError::MissingCredentials(message.clone())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::Purpose;

    fn request(purpose: Purpose) -> OracleRequest {
        OracleRequest {
            purpose,
            system: String::new(),
            blocks: vec![],
            max_tokens: 1,
        }
    }

    #[tokio::test]
    async fn script_then_handler() {
        let oracle = MockOracle::with_handler(|req| {
            Ok(OracleResponse::text(format!("{:?}", req.purpose)))
        });
        oracle.push_text("first");
        let a = oracle.complete(request(Purpose::Scoring)).await.unwrap();
        let b = oracle.complete(request(Purpose::Aggregation)).await.unwrap();
        assert_eq!(a.text, "first");
        assert_eq!(b.text, "Aggregation");
        assert_eq!(oracle.call_count(), 2);
        assert_eq!(oracle.requests()[1].purpose, Purpose::Aggregation);
    }

    #[tokio::test]
    async fn empty_mock_errors() {
        let oracle = MockOracle::new();
        assert!(oracle.complete(request(Purpose::Scoring)).await.is_err());
        assert!(MockOracle::unconfigured("no key").check_config().unwrap_err().is_config());
    }
}
