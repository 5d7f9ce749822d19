//! Shared retry and timeout utilities for LLM backends
//!
//! Rate-limit failures (HTTP 429 / `RESOURCE_EXHAUSTED`) are retried with
//! exponential backoff: 1 s, 2 s, 4 s for the default four attempts. Every
//! other failure is returned to the caller on the first occurrence.

use crate::llm::LlmError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Standard timeout and retry constants for LLM APIs
pub mod constants {
    /// Request timeout of the HTTP client (180 seconds)
    pub const DEFAULT_TIMEOUT_SECS: u64 = 180;

    /// Maximum waiting time between retries (30 seconds)
    pub const MAX_RETRY_DELAY_MS: u64 = 30000;

    /// Delay before the first retry (1 second)
    pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;

    /// Total attempts, the first one included
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 4;
}

/// Retry configuration for rate-limited LLM requests
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds
    pub base_delay_ms: u64,

    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        create_standard_retry_config()
    }
}

/// Delay before retrying after failed attempt number `attempt` (1-based).
///
/// base * 2^(attempt-1), capped at `max_delay_ms`.
pub fn calculate_backoff_delay(attempt: u32, config: &RetryConfig) -> u64 {
    if attempt == 0 {
        return 0;
    }

    let exponent = attempt.saturating_sub(1);
    config
        .base_delay_ms
        .saturating_mul(2_u64.saturating_pow(exponent))
        .min(config.max_delay_ms)
}

/// Creates the standard retry configuration: 4 attempts, 1 s doubling backoff
pub fn create_standard_retry_config() -> RetryConfig {
    RetryConfig {
        max_attempts: constants::DEFAULT_MAX_ATTEMPTS,
        base_delay_ms: constants::DEFAULT_BASE_DELAY_MS,
        max_delay_ms: constants::MAX_RETRY_DELAY_MS,
    }
}

/// Run `operation` until it succeeds, fails with a non-rate-limit error, or
/// the attempt budget is spent.
///
/// `operation` receives the 1-based attempt number. `on_retry(attempt, delay_ms)`
/// runs after a rate-limited attempt, before the backoff sleep. Exhausting
/// the budget yields `LlmError::RetriesExhausted`.
pub async fn with_rate_limit_retry<T, F, Fut, N>(
    config: &RetryConfig,
    label: &str,
    mut operation: F,
    mut on_retry: N,
) -> Result<T, LlmError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
    N: FnMut(u32, u64),
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_rate_limited() => {
                if attempt >= max_attempts {
                    bprintln!(error: "{} still rate limited after {} attempts", label, attempt);
                    return Err(LlmError::RetriesExhausted { attempts: attempt });
                }

                let delay_ms = retry_delay(&err, attempt, config);
                bprintln!(warn: "⏱️ {} rate limited. Retrying in {} seconds (attempt {}/{})",
                         label, delay_ms / 1000, attempt, max_attempts);

                on_retry(attempt, delay_ms);
                sleep(Duration::from_millis(delay_ms)).await;
                attempt += 1;
            }
            Err(err) => {
                bprintln!(dev: "{} failed without retry: {}", label, err);
                return Err(err);
            }
        }
    }
}

/// `with_rate_limit_retry` without a retry hook
pub async fn retry_rate_limited<T, F, Fut>(
    config: &RetryConfig,
    label: &str,
    operation: F,
) -> Result<T, LlmError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    with_rate_limit_retry(config, label, operation, |_, _| {}).await
}

// A server-supplied retry-after can stretch the delay, never shorten it.
fn retry_delay(err: &LlmError, attempt: u32, config: &RetryConfig) -> u64 {
    let backoff = calculate_backoff_delay(attempt, config);
    match err {
        LlmError::RateLimitError {
            retry_after: Some(seconds),
        } => backoff.max(seconds.saturating_mul(1000)).min(config.max_delay_ms),
        _ => backoff,
    }
}

/// Turn a non-success HTTP response into a classified `LlmError`.
///
/// 429 becomes `RateLimitError` (honouring a numeric `retry-after` header);
/// anything else becomes `ApiError` carrying the status and body, so the
/// numeric marker survives into the message.
pub async fn check_response(
    res: reqwest::Response,
    provider_name: &str,
) -> Result<reqwest::Response, LlmError> {
    let status = res.status();
    bprintln!(dev: "{} API response status: {}", provider_name, status);

    if status.is_success() {
        return Ok(res);
    }

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = res
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        return Err(LlmError::RateLimitError { retry_after });
    }

    let error_text = res
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    Err(LlmError::ApiError(format!(
        "{} HTTP error {}: {}",
        provider_name, status, error_text
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_standard_backoff_sequence() {
        let config = create_standard_retry_config();
        assert_eq!(config.max_attempts, 4);
        let delays: Vec<u64> = (1..=3).map(|a| calculate_backoff_delay(a, &config)).collect();
        assert_eq!(delays, vec![1000, 2000, 4000]);
        assert_eq!(calculate_backoff_delay(0, &config), 0);
    }

    #[test]
    fn test_backoff_is_capped() {
        let config = RetryConfig {
            max_delay_ms: 3000,
            ..create_standard_retry_config()
        };
        assert_eq!(calculate_backoff_delay(2, &config), 2000);
        assert_eq!(calculate_backoff_delay(3, &config), 3000);
        assert_eq!(calculate_backoff_delay(40, &config), 3000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_rate_limits_then_succeeds() {
        let calls = AtomicU32::new(0);
        let mut notices = Vec::new();
        let started = tokio::time::Instant::now();

        let result = with_rate_limit_retry(
            &RetryConfig::default(),
            "test",
            |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(LlmError::ApiError("429 Too Many Requests".into()))
                    } else {
                        Ok("done")
                    }
                }
            },
            |attempt, delay| notices.push((attempt, delay)),
        )
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(notices, vec![(1, 1000), (2, 2000)]);
        assert!(started.elapsed() >= Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_and_non_retryable() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_rate_limited(&RetryConfig::default(), "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(LlmError::RateLimitError { retry_after: None }) }
        })
        .await;
        assert!(matches!(result, Err(LlmError::RetriesExhausted { attempts: 4 })));
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_rate_limited(&RetryConfig::default(), "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(LlmError::ApiError("400 Bad Request".into())) }
        })
        .await;
        assert!(matches!(result, Err(LlmError::ApiError(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
