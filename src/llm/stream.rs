//! Retry-wrapped streaming client
//!
//! Streams one generation into an event channel. Rate-limited attempts are
//! retried transparently; the consumer sees `Clear`, a one-line notice, then
//! `Clear` again before the next attempt's text begins.

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc::UnboundedSender;

use crate::llm::retry_utils::{with_rate_limit_retry, RetryConfig};
use crate::llm::{Backend, GenerationRequest, LlmError, StreamEvent, StreamRecord};

/// Client that turns a backend's chunk stream into `StreamEvent`s
#[derive(Clone)]
pub struct StreamingClient {
    backend: Arc<dyn Backend>,
    retry: RetryConfig,
}

impl StreamingClient {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    /// Stream `request` into `sink`.
    ///
    /// Exactly one terminal event (`Complete` or `Error`) is sent. A closed
    /// receiver is ignored. The returned record describes what was sent on
    /// every path.
    pub async fn stream(
        &self,
        request: &GenerationRequest,
        sink: &UnboundedSender<StreamEvent>,
    ) -> StreamRecord {
        let full_prompt = request.serialize_full_prompt();

        let outcome = with_rate_limit_retry(
            &self.retry,
            "streamGenerateContent",
            |attempt| {
                let backend = Arc::clone(&self.backend);
                let request = request.clone();
                let sink = sink.clone();
                async move {
                    if attempt > 1 {
                        let _ = sink.send(StreamEvent::Clear);
                    }
                    stream_attempt(backend, &request, &sink).await
                }
            },
            |_, delay_ms| {
                let _ = sink.send(StreamEvent::Clear);
                let _ = sink.send(StreamEvent::Chunk(format!(
                    "[System: API rate limit hit. Retrying in {}s...]",
                    delay_ms / 1000
                )));
            },
        )
        .await;

        let terminal = match outcome {
            Ok(text) => StreamEvent::Complete(text),
            Err(err @ LlmError::RetriesExhausted { .. }) => StreamEvent::Error(err.to_string()),
            Err(err) => {
                bprintln!(error: "Stream failed: {}", err);
                StreamEvent::Error(format!("Error generating content: {}", err))
            }
        };
        let _ = sink.send(terminal);

        StreamRecord { full_prompt }
    }
}

async fn stream_attempt(
    backend: Arc<dyn Backend>,
    request: &GenerationRequest,
    sink: &UnboundedSender<StreamEvent>,
) -> Result<String, LlmError> {
    let mut chunks = backend.stream_content(request).await?;
    let mut text = String::new();

    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        if chunk.is_empty() {
            continue;
        }
        text.push_str(&chunk);
        let _ = sink.send(StreamEvent::Chunk(chunk));
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::{Attempt, Failure, MockBackend};
    use std::time::Duration;
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    fn drain(rx: &mut UnboundedReceiver<StreamEvent>) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn chunk(text: &str) -> StreamEvent {
        StreamEvent::Chunk(text.to_string())
    }

    #[tokio::test]
    async fn test_success_streams_chunks_then_complete() {
        let backend = Arc::new(MockBackend::streaming(vec![Attempt::ok(&["Hel", "lo"])]));
        let client = StreamingClient::new(backend.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let request = GenerationRequest::new("hi", "be kind", 0.7).with_few_shot("q", "a");
        let record = client.stream(&request, &tx).await;

        assert_eq!(
            drain(&mut rx),
            vec![chunk("Hel"), chunk("lo"), StreamEvent::Complete("Hello".into())]
        );
        assert_eq!(record.full_prompt, request.serialize_full_prompt());
        assert_eq!(backend.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_retry_protocol() {
        let backend = Arc::new(MockBackend::streaming(vec![
            Attempt::rate_limited(),
            Attempt::partial(&["par"], Failure::Api("429 RESOURCE_EXHAUSTED".into())),
            Attempt::ok(&["done"]),
        ]));
        let client = StreamingClient::new(backend.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let started = tokio::time::Instant::now();
        client
            .stream(&GenerationRequest::new("p", "s", 0.7), &tx)
            .await;
        assert!(started.elapsed() >= Duration::from_millis(3000));

        assert_eq!(
            drain(&mut rx),
            vec![
                StreamEvent::Clear,
                chunk("[System: API rate limit hit. Retrying in 1s...]"),
                StreamEvent::Clear,
                chunk("par"),
                StreamEvent::Clear,
                chunk("[System: API rate limit hit. Retrying in 2s...]"),
                StreamEvent::Clear,
                chunk("done"),
                StreamEvent::Complete("done".into()),
            ]
        );

        let times = backend.attempt_times.lock().unwrap().clone();
        assert_eq!(times.len(), 3);
        assert!(times[1] - times[0] >= Duration::from_millis(1000));
        assert!(times[2] - times[1] >= Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_rate_limit_error_is_terminal() {
        let backend = Arc::new(MockBackend::streaming(vec![
            Attempt::failing("invalid argument"),
            Attempt::ok(&["never"]),
        ]));
        let client = StreamingClient::new(backend.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();

        client.stream(&GenerationRequest::new("p", "s", 0.7), &tx).await;

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        match &events[0] {
            StreamEvent::Error(message) => {
                assert!(message.starts_with("Error generating content: "));
                assert!(message.contains("invalid argument"));
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(backend.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_report_rate_limit_failure() {
        let backend = Arc::new(MockBackend::streaming(vec![Attempt::rate_limited(); 4]));
        let client = StreamingClient::new(backend.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();

        client.stream(&GenerationRequest::new("p", "s", 0.7), &tx).await;

        let events = drain(&mut rx);
        assert_eq!(
            events.last(),
            Some(&StreamEvent::Error(
                "Failed to get response from API after multiple retries due to rate limiting.".into()
            ))
        );
        assert!(!events.iter().any(|e| matches!(e, StreamEvent::Complete(_))));
        assert_eq!(backend.request_count(), 4);
    }

    #[tokio::test]
    async fn test_dropped_receiver_is_not_an_error() {
        let backend = Arc::new(MockBackend::streaming(vec![Attempt::ok(&["x"])]));
        let client = StreamingClient::new(backend);
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        let record = client.stream(&GenerationRequest::new("p", "s", 0.7), &tx).await;
        assert!(record.full_prompt.contains("\"p\""));
    }
}
