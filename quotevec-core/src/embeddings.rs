//! Embeddings module — text to vector conversion via a remote feature-extraction service
//!
//! Provides the `EmbeddingBackend` trait consumed by the ingestion and query
//! pipelines, and `HuggingFaceEmbeddingClient`, which calls the Hugging Face
//! Inference API `pipeline/feature-extraction/{model}` endpoint.
//!
//! One request per call. No client-side caching: `use_cache` and
//! `wait_for_model` are forwarded to the service as request options.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;

use crate::config::EmbeddingConfig;

/// Hugging Face Inference API root
pub const DEFAULT_BASE_URL: &str = "https://api-inference.huggingface.co";

/// Output dimensions of `sentence-transformers/all-MiniLM-L6-v2`
pub const MINILM_DIMENSIONS: usize = 384;

// ============================================================================
// EmbeddingBackend trait
// ============================================================================

/// Abstraction over embedding providers.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed a single text into a vector of exactly `dimensions()` floats.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Returns the embedding dimension (e.g., 384).
    fn dimensions(&self) -> usize;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Error types
// ============================================================================

/// Embedding generation errors
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Missing API key (set HF_TOKEN)")]
    MissingApiKey,

    #[error("Credential rejected ({status}): {message}")]
    Auth { status: u16, message: String },

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Malformed embedding response: {0}")]
    Decode(String),

    #[error("Invalid response: expected {expected} dimensions, got {actual}")]
    InvalidDimensions { expected: usize, actual: usize },

    #[error("All {attempts} attempts failed: {last}")]
    RetryExhausted {
        attempts: usize,
        #[source]
        last: Box<EmbeddingError>,
    },
}

impl EmbeddingError {
    /// Only transport failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EmbeddingError::Transport(_))
    }
}

// ============================================================================
// Config
// ============================================================================

/// Hugging Face embedding client configuration
#[derive(Debug, Clone)]
pub struct HuggingFaceConfig {
    pub api_key: String,
    pub model: String,
    pub dimensions: usize,
    pub use_cache: bool,
    pub wait_for_model: bool,
    pub timeout: Duration,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl HuggingFaceConfig {
    pub fn new(api_key: String, model: String, dimensions: usize) -> Self {
        Self {
            api_key,
            model,
            dimensions,
            use_cache: true,
            wait_for_model: true,
            timeout: Duration::from_secs(30),
            max_retries: 0,
            retry_delay_ms: 500,
        }
    }

    /// `api_key` is resolved by the caller (see `QuoteVecConfig::embedding_token`).
    pub fn from_config(config: &EmbeddingConfig, api_key: Option<String>) -> Self {
        Self {
            use_cache: config.use_cache,
            wait_for_model: config.wait_for_model,
            timeout: Duration::from_secs(config.timeout_seconds),
            max_retries: config.max_retries as usize,
            retry_delay_ms: config.retry_delay_ms,
            ..Self::new(
                api_key.unwrap_or_default(),
                config.model.clone(),
                config.dimensions as usize,
            )
        }
    }
}

/// Build the configured backend, shared between the ingestion and query pipelines.
pub fn create_backend(
    config: &EmbeddingConfig,
    api_key: Option<String>,
) -> Result<Arc<dyn EmbeddingBackend>, EmbeddingError> {
    let client = HuggingFaceEmbeddingClient::with_base_url(
        HuggingFaceConfig::from_config(config, api_key),
        config.base_url.clone(),
    )?;
    Ok(Arc::new(client))
}

// ============================================================================
// Wire structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct FeatureExtractionRequest<'a> {
    inputs: &'a str,
    options: FeatureExtractionOptions,
}

#[derive(Debug, Serialize)]
struct FeatureExtractionOptions {
    use_cache: bool,
    wait_for_model: bool,
}

/// The service answers a single input with a flat vector; some deployments
/// wrap it in a one-row batch.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FeatureExtractionResponse {
    Flat(Vec<f32>),
    Nested(Vec<Vec<f32>>),
}

#[derive(Debug, Deserialize)]
struct ServiceErrorResponse {
    error: String,
}

// ============================================================================
// HuggingFaceEmbeddingClient
// ============================================================================

/// Feature-extraction client for the Hugging Face Inference API.
#[derive(Debug, Clone)]
pub struct HuggingFaceEmbeddingClient {
    client: Client,
    config: HuggingFaceConfig,
    base_url: String,
}

impl HuggingFaceEmbeddingClient {
    pub fn new(config: HuggingFaceConfig) -> Result<Self, EmbeddingError> {
        Self::with_base_url(config, DEFAULT_BASE_URL.to_string())
    }

    /// Create a client with a custom base URL (for testing / self-hosted endpoints)
    pub fn with_base_url(
        config: HuggingFaceConfig,
        base_url: String,
    ) -> Result<Self, EmbeddingError> {
        if config.api_key.is_empty() {
            return Err(EmbeddingError::MissingApiKey);
        }

        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            config,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// The per-model feature-extraction endpoint.
    pub fn endpoint(&self) -> String {
        format!(
            "{}/pipeline/feature-extraction/{}",
            self.base_url, self.config.model
        )
    }

    /// Generate an embedding, retrying transport failures when `max_retries > 0`.
    pub async fn embed_raw(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if self.config.max_retries == 0 {
            return self.embed_once(text).await;
        }

        let retry_strategy = ExponentialBackoff::from_millis(self.config.retry_delay_ms)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(self.config.max_retries);

        let result = RetryIf::spawn(
            retry_strategy,
            || self.embed_once(text),
            |e: &EmbeddingError| e.is_retryable(),
        )
        .await;

        match result {
            Ok(vec) => Ok(vec),
            Err(e) if e.is_retryable() => {
                let attempts = self.config.max_retries + 1;
                tracing::error!(attempts, error = %e, "All embedding attempts failed");
                Err(EmbeddingError::RetryExhausted {
                    attempts,
                    last: Box::new(e),
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn embed_once(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let request = FeatureExtractionRequest {
            inputs: text,
            options: FeatureExtractionOptions {
                use_cache: self.config.use_cache,
                wait_for_model: self.config.wait_for_model,
            },
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        tracing::info!(status = %status, model = %self.config.model, "Feature extraction response status");

        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ServiceErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);

            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => EmbeddingError::Auth {
                    status: status.as_u16(),
                    message,
                },
                _ => {
                    tracing::error!(code = status.as_u16(), message = %message, "Embedding API error");
                    EmbeddingError::Api {
                        code: status.as_u16(),
                        message,
                    }
                }
            });
        }

        let values = decode_vector(&body)?;

        if values.len() != self.config.dimensions {
            return Err(EmbeddingError::InvalidDimensions {
                expected: self.config.dimensions,
                actual: values.len(),
            });
        }

        Ok(values)
    }
}

fn decode_vector(body: &str) -> Result<Vec<f32>, EmbeddingError> {
    let parsed: FeatureExtractionResponse = serde_json::from_str(body)
        .map_err(|e| EmbeddingError::Decode(format!("expected a numeric array: {}", e)))?;

    let values = match parsed {
        FeatureExtractionResponse::Flat(v) => v,
        FeatureExtractionResponse::Nested(mut rows) => {
            if rows.len() != 1 {
                return Err(EmbeddingError::Decode(format!(
                    "expected one embedding row, got {}",
                    rows.len()
                )));
            }
            rows.remove(0)
        }
    };

    if values.is_empty() {
        return Err(EmbeddingError::Decode("empty embedding".to_string()));
    }

    // Numbers beyond f32 range parse as infinity.
    if let Some(index) = values.iter().position(|v| !v.is_finite()) {
        return Err(EmbeddingError::Decode(format!(
            "non-finite value at index {}",
            index
        )));
    }

    Ok(values)
}

#[async_trait]
impl EmbeddingBackend for HuggingFaceEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.embed_raw(text).await
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn name(&self) -> &str {
        "huggingface"
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
    const ENDPOINT: &str = "/pipeline/feature-extraction/sentence-transformers/all-MiniLM-L6-v2";

    fn test_config(api_key: &str) -> HuggingFaceConfig {
        HuggingFaceConfig {
            api_key: api_key.to_string(),
            model: MODEL.to_string(),
            dimensions: MINILM_DIMENSIONS,
            use_cache: true,
            wait_for_model: true,
            timeout: Duration::from_secs(5),
            max_retries: 0,
            retry_delay_ms: 1,
        }
    }

    fn mock_embedding_response() -> serde_json::Value {
        let values: Vec<f32> = (0..384).map(|i| (i as f32) / 384.0).collect();
        serde_json::json!(values)
    }

    #[tokio::test]
    async fn test_embed_posts_inputs_and_options_with_bearer_token() {
        let mock_server = MockServer::start().await;
        let client = HuggingFaceEmbeddingClient::with_base_url(test_config("hf_test"), mock_server.uri())
            .expect("Failed to create client");

        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .and(header("authorization", "Bearer hf_test"))
            .and(header("content-type", "application/json"))
            .and(body_json(serde_json::json!({
                "inputs": "Vaya con Dios.",
                "options": { "use_cache": true, "wait_for_model": true }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_embedding_response()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let embedding = client.embed_raw("Vaya con Dios.").await.expect("embed failed");

        assert_eq!(embedding.len(), 384, "Expected 384 dimensions");
    }

    #[tokio::test]
    async fn test_options_are_forwarded_from_config() {
        let mock_server = MockServer::start().await;
        let mut config = test_config("hf_test");
        config.use_cache = false;
        config.wait_for_model = false;
        let client = HuggingFaceEmbeddingClient::with_base_url(config, mock_server.uri()).unwrap();

        Mock::given(method("POST"))
            .and(body_json(serde_json::json!({
                "inputs": "hello",
                "options": { "use_cache": false, "wait_for_model": false }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_embedding_response()))
            .expect(1)
            .mount(&mock_server)
            .await;

        assert!(client.embed_raw("hello").await.is_ok());
    }

    #[tokio::test]
    async fn test_every_text_yields_same_dimensions() {
        let mock_server = MockServer::start().await;
        let client = HuggingFaceEmbeddingClient::with_base_url(test_config("hf_test"), mock_server.uri()).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(mock_embedding_response()))
            .mount(&mock_server)
            .await;

        let a = client.embed("Vaya con Dios.").await.unwrap();
        let b = client.embed("I am an F.B.I. agent.").await.unwrap();

        assert_eq!(a.len(), b.len());
        assert_eq!(a.len(), client.dimensions());
    }

    #[tokio::test]
    async fn test_nested_single_row_is_flattened() {
        let mock_server = MockServer::start().await;
        let client = HuggingFaceEmbeddingClient::with_base_url(test_config("hf_test"), mock_server.uri()).unwrap();

        let values: Vec<f32> = vec![0.5; 384];
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([values])))
            .mount(&mock_server)
            .await;

        let embedding = client.embed_raw("hello").await.unwrap();
        assert_eq!(embedding.len(), 384);
        assert!(embedding.iter().all(|v| (*v - 0.5).abs() < f32::EPSILON));
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_auth_error() {
        let mock_server = MockServer::start().await;
        let client = HuggingFaceEmbeddingClient::with_base_url(test_config("bad-token"), mock_server.uri()).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": "Invalid credentials in Authorization header"
            })))
            .mount(&mock_server)
            .await;

        match client.embed_raw("hello").await {
            Err(EmbeddingError::Auth { status, message }) => {
                assert_eq!(status, 401);
                assert_eq!(message, "Invalid credentials in Authorization header");
            }
            other => panic!("Expected Auth error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_service_error_body_is_surfaced() {
        let mock_server = MockServer::start().await;
        let client = HuggingFaceEmbeddingClient::with_base_url(test_config("hf_test"), mock_server.uri()).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
                "error": "Model is currently loading",
                "estimated_time": 20.0
            })))
            .mount(&mock_server)
            .await;

        match client.embed_raw("hello").await {
            Err(EmbeddingError::Api { code, message }) => {
                assert_eq!(code, 503);
                assert_eq!(message, "Model is currently loading");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_non_numeric_body_is_decode_error() {
        let mock_server = MockServer::start().await;
        let client = HuggingFaceEmbeddingClient::with_base_url(test_config("hf_test"), mock_server.uri()).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embedding": "not a vector"
            })))
            .mount(&mock_server)
            .await;

        let result = client.embed_raw("hello").await;
        assert!(
            matches!(result, Err(EmbeddingError::Decode(_))),
            "Expected Decode error, got {:?}",
            result
        );
    }

    #[tokio::test]
    async fn test_empty_vector_is_decode_error() {
        let mock_server = MockServer::start().await;
        let client = HuggingFaceEmbeddingClient::with_base_url(test_config("hf_test"), mock_server.uri()).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&mock_server)
            .await;

        assert!(matches!(client.embed_raw("hello").await, Err(EmbeddingError::Decode(_))));
    }

    #[tokio::test]
    async fn test_out_of_range_value_is_decode_error() {
        let mock_server = MockServer::start().await;
        let client = HuggingFaceEmbeddingClient::with_base_url(test_config("hf_test"), mock_server.uri()).unwrap();

        let mut body = String::from("[1e39");
        for _ in 1..384 {
            body.push_str(",0.0");
        }
        body.push(']');

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "application/json"))
            .mount(&mock_server)
            .await;

        match client.embed_raw("huge").await {
            Err(EmbeddingError::Decode(message)) => assert!(message.contains("index 0"), "{}", message),
            other => panic!("Expected Decode error, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_vector_rejects_non_finite() {
        assert!(matches!(decode_vector("[0.5, 1e39]"), Err(EmbeddingError::Decode(_))));
        assert!(matches!(decode_vector("[-1e40]"), Err(EmbeddingError::Decode(_))));
        assert_eq!(decode_vector("[0.5, -0.25]").unwrap(), vec![0.5, -0.25]);
    }

    #[tokio::test]
    async fn test_wrong_dimensions_is_rejected() {
        let mock_server = MockServer::start().await;
        let client = HuggingFaceEmbeddingClient::with_base_url(test_config("hf_test"), mock_server.uri()).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([0.1, 0.2, 0.3])))
            .mount(&mock_server)
            .await;

        match client.embed_raw("hello").await {
            Err(EmbeddingError::InvalidDimensions { expected, actual }) => {
                assert_eq!(expected, 384);
                assert_eq!(actual, 3);
            }
            other => panic!("Expected InvalidDimensions error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_api_key_fails_construction() {
        let result = HuggingFaceEmbeddingClient::new(test_config(""));
        assert!(matches!(result, Err(EmbeddingError::MissingApiKey)));
    }

    #[tokio::test]
    async fn test_transport_error_without_retry() {
        // Nothing listens on port 1.
        let client =
            HuggingFaceEmbeddingClient::with_base_url(test_config("hf_test"), "http://127.0.0.1:1".to_string())
                .unwrap();

        let result = client.embed_raw("hello").await;
        assert!(matches!(result, Err(EmbeddingError::Transport(_))), "got {:?}", result);
    }

    #[tokio::test]
    async fn test_transport_error_retries_until_exhausted() {
        let mut config = test_config("hf_test");
        config.max_retries = 2;
        let client =
            HuggingFaceEmbeddingClient::with_base_url(config, "http://127.0.0.1:1".to_string()).unwrap();

        match client.embed_raw("hello").await {
            Err(EmbeddingError::RetryExhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert!(last.is_retryable());
            }
            other => panic!("Expected RetryExhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_auth_error_is_not_retried() {
        let mock_server = MockServer::start().await;
        let mut config = test_config("hf_test");
        config.max_retries = 3;
        let client = HuggingFaceEmbeddingClient::with_base_url(config, mock_server.uri()).unwrap();

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .expect(1)
            .mount(&mock_server)
            .await;

        match client.embed_raw("hello").await {
            Err(EmbeddingError::Auth { status, message }) => {
                assert_eq!(status, 403);
                assert_eq!(message, "forbidden");
            }
            other => panic!("Expected Auth error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_endpoint_is_built_from_model() {
        let client =
            HuggingFaceEmbeddingClient::with_base_url(test_config("hf_test"), "http://localhost:9000/".to_string())
                .unwrap();
        assert_eq!(
            client.endpoint(),
            "http://localhost:9000/pipeline/feature-extraction/sentence-transformers/all-MiniLM-L6-v2"
        );
        assert_eq!(client.name(), "huggingface");
    }

    #[test]
    fn test_from_config_copies_request_options() {
        let mut app = EmbeddingConfig::default();
        app.use_cache = false;
        app.max_retries = 2;
        app.timeout_seconds = 7;

        let config = HuggingFaceConfig::from_config(&app, Some("hf_x".to_string()));

        assert_eq!(config.api_key, "hf_x");
        assert!(HuggingFaceConfig::from_config(&app, None).api_key.is_empty());
        assert_eq!(config.dimensions, 384);
        assert!(!config.use_cache);
        assert!(config.wait_for_model);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.timeout, Duration::from_secs(7));
    }
}
