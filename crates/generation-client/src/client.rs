//! Content generator API client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::warn;

use crate::types::{GeneratedPayload, GenerationRequest};
use crate::validate::validate_payload;

/// Error types for content generation.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("No generator configured")]
    NotConfigured,

    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    #[error("Timeout")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, GenerationError>;

/// Generation contract the service depends on. Tests script this seam
/// instead of calling a live model.
#[async_trait]
pub trait ContentGenerator: Send + Sync {
    /// Produce validated content for one entry.
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedPayload>;
}

/// Configuration for the generator client.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// API base URL. Empty means no generator is deployed.
    pub base_url: String,
    /// API key.
    pub api_key: String,
    /// Model requested for generation.
    pub model: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Additional attempts allowed for rate-limited requests.
    pub max_retries: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: String::new(),
            model: "lexigen-small".to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 2,
        }
    }
}

impl GeneratorConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let timeout_secs = std::env::var("GENERATOR_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);
        Self {
            base_url: std::env::var("GENERATOR_URL").unwrap_or_default(),
            api_key: std::env::var("GENERATOR_API_KEY").unwrap_or_default(),
            model: std::env::var("GENERATOR_MODEL").unwrap_or(defaults.model),
            timeout: Duration::from_secs(timeout_secs),
            max_retries: defaults.max_retries,
        }
    }
}

/// HTTP client for the content generator API.
pub struct GenerationClient {
    config: GeneratorConfig,
    http: Client,
}

impl GenerationClient {
    /// Create a new client with the given configuration.
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, http })
    }

    /// Create a client from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(GeneratorConfig::from_env())
    }

    /// Whether a generator endpoint was configured at all.
    pub fn is_configured(&self) -> bool {
        !self.config.base_url.is_empty()
    }

    async fn request_content(&self, request: &GenerationRequest) -> Result<GeneratedPayload> {
        let url = format!("{}/generate", self.config.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "nodeId": request.node_id,
            "model": self.config.model,
            "sections": request.schema.sections,
            "targetLanguage": request.schema.target_language,
        });

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        match status {
            StatusCode::OK => {
                let payload: GeneratedPayload = response.json().await?;
                Ok(payload)
            }
            StatusCode::UNAUTHORIZED => Err(GenerationError::InvalidApiKey),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30);
                Err(GenerationError::RateLimited { retry_after })
            }
            _ => {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                Err(GenerationError::Api {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

#[async_trait]
impl ContentGenerator for GenerationClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<GeneratedPayload> {
        if !self.is_configured() {
            return Err(GenerationError::NotConfigured);
        }

        let mut last_error = None;

        // Only rate limits are retried; everything else fails the call.
        for _attempt in 0..=self.config.max_retries {
            match self.request_content(request).await {
                Ok(payload) => {
                    validate_payload(&payload, &request.schema.sections)?;
                    return Ok(payload);
                }
                Err(GenerationError::RateLimited { retry_after }) => {
                    warn!("Rate limited, waiting {}s", retry_after);
                    tokio::time::sleep(Duration::from_secs(retry_after)).await;
                    last_error = Some(GenerationError::RateLimited { retry_after });
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(GenerationError::Timeout))
    }
}
