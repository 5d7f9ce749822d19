//! Scripted backend used by unit tests

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::time::Instant;

use crate::llm::{Backend, ChunkStream, GenerationRequest, ImageRequest, LlmError, SuggestOptions};

/// How a scripted call fails
#[derive(Debug, Clone)]
pub enum Failure {
    RateLimit,
    Api(String),
}

impl Failure {
    fn to_error(&self) -> LlmError {
        match self {
            Failure::RateLimit => LlmError::RateLimitError { retry_after: None },
            Failure::Api(message) => LlmError::ApiError(message.clone()),
        }
    }
}

/// One scripted streaming attempt: chunks delivered, then an optional failure
#[derive(Debug, Clone)]
pub struct Attempt {
    pub chunks: Vec<String>,
    pub failure: Option<Failure>,
    /// Fail before the stream is opened instead of mid-stream
    pub fail_early: bool,
}

impl Attempt {
    pub fn ok(chunks: &[&str]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            failure: None,
            fail_early: false,
        }
    }

    pub fn rate_limited() -> Self {
        Self {
            chunks: Vec::new(),
            failure: Some(Failure::RateLimit),
            fail_early: true,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            chunks: Vec::new(),
            failure: Some(Failure::Api(message.to_string())),
            fail_early: true,
        }
    }

    pub fn partial(chunks: &[&str], failure: Failure) -> Self {
        Self {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            failure: Some(failure),
            fail_early: false,
        }
    }
}

#[derive(Default)]
pub struct MockBackend {
    attempts: Mutex<VecDeque<Attempt>>,
    replies: Mutex<VecDeque<Result<String, Failure>>>,
    images: Mutex<VecDeque<Result<Vec<String>, Failure>>>,
    pub requests: Mutex<Vec<GenerationRequest>>,
    pub prompts: Mutex<Vec<(String, Option<SuggestOptions>)>>,
    pub attempt_times: Mutex<Vec<Instant>>,
}

impl MockBackend {
    pub fn streaming(attempts: Vec<Attempt>) -> Self {
        let backend = Self::default();
        backend.attempts.lock().unwrap().extend(attempts);
        backend
    }

    pub fn replying(replies: Vec<Result<String, Failure>>) -> Self {
        let backend = Self::default();
        backend.replies.lock().unwrap().extend(replies);
        backend
    }

    pub fn imaging(results: Vec<Result<Vec<String>, Failure>>) -> Self {
        let backend = Self::default();
        backend.images.lock().unwrap().extend(results);
        backend
    }

    pub fn push_attempts(&self, attempts: Vec<Attempt>) {
        self.attempts.lock().unwrap().extend(attempts);
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.requests.lock().unwrap().last().cloned()
    }

    fn record_attempt(&self) {
        self.attempt_times.lock().unwrap().push(Instant::now());
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn stream_content(&self, request: &GenerationRequest) -> Result<ChunkStream, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.record_attempt();

        let attempt = self
            .attempts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::ApiError("no scripted response".into()))?;

        if attempt.fail_early {
            if let Some(failure) = &attempt.failure {
                return Err(failure.to_error());
            }
        }

        let mut items: Vec<Result<String, LlmError>> = attempt.chunks.into_iter().map(Ok).collect();
        if let Some(failure) = &attempt.failure {
            items.push(Err(failure.to_error()));
        }
        Ok(stream::iter(items).boxed())
    }

    async fn generate(
        &self,
        prompt: &str,
        _temperature: f32,
        options: Option<&SuggestOptions>,
    ) -> Result<String, LlmError> {
        self.prompts
            .lock()
            .unwrap()
            .push((prompt.to_string(), options.cloned()));
        self.record_attempt();

        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(failure)) => Err(failure.to_error()),
            None => Err(LlmError::ApiError("no scripted reply".into())),
        }
    }

    async fn generate_images(&self, _request: &ImageRequest) -> Result<Vec<String>, LlmError> {
        self.record_attempt();
        match self.images.lock().unwrap().pop_front() {
            Some(Ok(images)) => Ok(images),
            Some(Err(failure)) => Err(failure.to_error()),
            None => Err(LlmError::ApiError("no scripted images".into())),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }
}
