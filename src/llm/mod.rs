//! LLM provider abstraction layer
//!
//! This module defines the backend trait used for text streaming, one-shot
//! suggestions and image generation, plus the retry-wrapped streaming client
//! that the workflow and composer build on.

pub use async_trait::async_trait;

pub mod factory;
pub mod gemini;
pub mod image;
pub mod retry_utils;
pub mod stream;
pub mod suggest;
mod types;

#[cfg(test)]
pub(crate) mod mock;

pub use self::factory::create_backend;
pub use self::stream::StreamingClient;
pub use self::types::*;

use futures::stream::BoxStream;
use thiserror::Error;

/// Text chunks as they arrive from a streaming call
pub type ChunkStream = BoxStream<'static, Result<String, LlmError>>;

/// Common trait for all LLM backends
#[async_trait]
pub trait Backend: Send + Sync {
    /// Start a streaming generation.
    ///
    /// Errors may surface either from this call (before the first chunk) or
    /// as an `Err` item inside the stream (mid-stream).
    async fn stream_content(&self, request: &GenerationRequest) -> Result<ChunkStream, LlmError>;

    /// One-shot, non-streaming generation of a single prompt
    async fn generate(
        &self,
        prompt: &str,
        temperature: f32,
        options: Option<&SuggestOptions>,
    ) -> Result<String, LlmError>;

    /// Generate images, returned as base64-encoded JPEG payloads in order
    async fn generate_images(&self, request: &ImageRequest) -> Result<Vec<String>, LlmError>;

    /// Get the provider name
    fn name(&self) -> &str;

    /// Get the model name
    fn model(&self) -> &str;
}

/// Error types for LLM operations
#[derive(Debug, Error)]
pub enum LlmError {
    /// API request error
    #[error("API error: {0}")]
    ApiError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Rate limit error
    #[error("429 RESOURCE_EXHAUSTED: rate limit exceeded{}", retry_suffix(.retry_after))]
    RateLimitError { retry_after: Option<u64> },

    /// Rate limiting persisted through every attempt
    #[error("Failed to get response from API after multiple retries due to rate limiting.")]
    RetriesExhausted { attempts: u32 },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

fn retry_suffix(retry_after: &Option<u64>) -> String {
    match retry_after {
        Some(seconds) => format!(" (retry after {} seconds)", seconds),
        None => String::new(),
    }
}

impl LlmError {
    /// Whether this failure belongs to the transient rate-limit class.
    ///
    /// Backends do not always classify throttling themselves, so the message
    /// text is also checked for the HTTP status or the gRPC status name.
    pub fn is_rate_limited(&self) -> bool {
        match self {
            LlmError::RateLimitError { .. } => true,
            LlmError::RetriesExhausted { .. } => false,
            LlmError::Http(err) => {
                err.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS)
                    || mentions_rate_limit(&err.to_string())
            }
            other => mentions_rate_limit(&other.to_string()),
        }
    }
}

fn mentions_rate_limit(message: &str) -> bool {
    message.contains("429") || message.contains("RESOURCE_EXHAUSTED")
}
