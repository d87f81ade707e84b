use async_trait::async_trait;
use failsafe::futures::CircuitBreaker as FuturesCircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error as FailsafeError, StateMachine};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{ensure_input, EmbeddingProvider};
use crate::error::EmbeddingError;

type Breaker = StateMachine<failure_policy::ConsecutiveFailures<backoff::EqualJittered>, ()>;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a str,
    model: &'a str,
    dimensions: usize,
}

/// Accepts both the OpenAI list shape and a bare `{"embedding": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum EmbeddingResponse {
    List { data: Vec<EmbeddingData> },
    Single { embedding: Vec<f32> },
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl EmbeddingResponse {
    fn into_vector(self) -> Option<Vec<f32>> {
        match self {
            EmbeddingResponse::List { data } => data.into_iter().next().map(|d| d.embedding),
            EmbeddingResponse::Single { embedding } => Some(embedding),
        }
    }
}

/// HTTP client for an OpenAI-compatible embeddings endpoint.
///
/// The underlying `reqwest::Client` pools connections and is cheap to clone,
/// so one provider instance is shared by every worker.
#[derive(Clone)]
pub struct HttpEmbeddingProvider {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    dimensions: usize,
    circuit_breaker: Breaker,
}

impl HttpEmbeddingProvider {
    /// Creates a provider with a request timeout and the default circuit
    /// breaker (5 consecutive failures, 10-20s reset).
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        dimensions: usize,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Self::with_circuit_breaker(endpoint, model, dimensions, timeout, 5, 10)
    }

    pub fn with_circuit_breaker(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        dimensions: usize,
        timeout: Duration,
        failure_threshold: u32,
        reset_timeout_secs: u64,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;

        let backoff = backoff::equal_jittered(
            Duration::from_secs(reset_timeout_secs),
            Duration::from_secs(reset_timeout_secs * 2),
        );
        let policy = failure_policy::consecutive_failures(failure_threshold, backoff);
        let circuit_breaker = Config::new().failure_policy(policy).build();

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: None,
            dimensions,
            circuit_breaker,
        })
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Returns the current state of the circuit breaker
    pub fn circuit_state(&self) -> String {
        if self.circuit_breaker.is_call_permitted() {
            "closed".to_string()
        } else {
            "open".to_string()
        }
    }

    async fn request(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut request = self.client.post(&self.endpoint).json(&EmbeddingRequest {
            input: text,
            model: &self.model,
            dimensions: self.dimensions,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| EmbeddingError::ProviderUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let vector = response
            .json::<EmbeddingResponse>()
            .await
            .map_err(|e| EmbeddingError::InvalidResponse(e.to_string()))?
            .into_vector()
            .ok_or_else(|| EmbeddingError::InvalidResponse("no embedding returned".into()))?;

        if vector.len() != self.dimensions {
            return Err(EmbeddingError::InvalidResponse(format!(
                "expected {} dimensions, got {}",
                self.dimensions,
                vector.len()
            )));
        }

        Ok(vector)
    }
}

fn classify_status(status: StatusCode, body: String) -> EmbeddingError {
    match status {
        StatusCode::BAD_REQUEST
        | StatusCode::PAYLOAD_TOO_LARGE
        | StatusCode::UNPROCESSABLE_ENTITY => {
            EmbeddingError::InvalidInput(format!("{}: {}", status, body))
        }
        _ => EmbeddingError::ProviderUnavailable(format!("{}: {}", status, body)),
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        ensure_input(text)?;

        // Only transport-level failures count against the breaker.
        let result = self
            .circuit_breaker
            .call_with(
                |e: &EmbeddingError| matches!(e, EmbeddingError::ProviderUnavailable(_)),
                self.request(text),
            )
            .await;

        match result {
            Ok(vector) => Ok(vector),
            Err(FailsafeError::Rejected) => Err(EmbeddingError::ProviderUnavailable(
                "embedding circuit breaker is open".to_string(),
            )),
            Err(FailsafeError::Inner(e)) => Err(e),
        }
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "http"
    }
}
