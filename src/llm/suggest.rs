//! One-shot suggestion calls
//!
//! Suggestions never fail across this boundary: the result is either the
//! trimmed model text or a string starting with `Error:`.

use crate::constants::SUGGESTION_TEMPERATURE;
use crate::llm::retry_utils::{retry_rate_limited, RetryConfig};
use crate::llm::{Backend, SuggestOptions};

pub const ERROR_PREFIX: &str = "Error:";

/// Ask the backend for a single suggestion with the standard retry policy
pub async fn suggest(backend: &dyn Backend, meta_prompt: &str, options: Option<&SuggestOptions>) -> String {
    suggest_with_retry(backend, meta_prompt, options, &RetryConfig::default()).await
}

pub async fn suggest_with_retry(
    backend: &dyn Backend,
    meta_prompt: &str,
    options: Option<&SuggestOptions>,
    retry: &RetryConfig,
) -> String {
    let result = retry_rate_limited(retry, "generateContent", move |_| {
        backend.generate(meta_prompt, SUGGESTION_TEMPERATURE, options)
    })
    .await;

    match result {
        Ok(text) => text.trim().to_string(),
        Err(err) => {
            bprintln!(error: "Suggestion failed: {}", err);
            format!("{} {}", ERROR_PREFIX, err)
        }
    }
}

/// Whether a suggestion result is the failure form
pub fn is_error_response(text: &str) -> bool {
    text.starts_with(ERROR_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::{Failure, MockBackend};
    use crate::llm::ResponseSchema;

    #[tokio::test]
    async fn test_success_is_trimmed() {
        let backend = MockBackend::replying(vec![Ok("  A sharper prompt.\n".into())]);
        let options = SuggestOptions::json(ResponseSchema::object());
        let text = suggest(&backend, "improve this", Some(&options)).await;
        assert_eq!(text, "A sharper prompt.");
        assert!(!is_error_response(&text));

        let prompts = backend.prompts.lock().unwrap();
        assert_eq!(prompts[0].0, "improve this");
        assert!(prompts[0].1.as_ref().unwrap().json_mode);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_then_success() {
        let backend = MockBackend::replying(vec![Err(Failure::RateLimit), Ok("ok".into())]);
        let started = tokio::time::Instant::now();
        assert_eq!(suggest(&backend, "p", None).await, "ok");
        assert!(started.elapsed() >= std::time::Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_start_with_error() {
        let backend = MockBackend::replying(vec![Err(Failure::Api("bad request".into()))]);
        let text = suggest(&backend, "p", None).await;
        assert!(is_error_response(&text));
        assert!(text.contains("bad request"));

        let backend = MockBackend::replying(vec![Err(Failure::RateLimit); 4]);
        let text = suggest(&backend, "p", None).await;
        assert_eq!(
            text,
            "Error: Failed to get response from API after multiple retries due to rate limiting."
        );
        assert_eq!(backend.attempt_times.lock().unwrap().len(), 4);
    }
}
