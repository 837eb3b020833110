//! Model fallback with exponential backoff.

use std::time::Duration;

use tracing::{error, warn};

use crate::error::ProctorError;
use crate::traits::GenerativeModel;

/// Retry schedule for text generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Model identifiers in preference order.
    pub models: Vec<String>,
    /// Attempts per model.
    pub retries_per_model: u32,
    /// Sleep after failed attempt `i` is `backoff_base * 2^i`.
    pub backoff_base: Duration,
}

impl RetryPolicy {
    /// Backoff after the zero-based attempt `attempt` of one model.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base
            .saturating_mul(2u32.saturating_pow(attempt.min(16)))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        use crate::constants::{
            GENERATION_BACKOFF_BASE, GENERATION_MODELS, GENERATION_RETRIES_PER_MODEL,
        };
        Self {
            models: GENERATION_MODELS.iter().map(|m| m.to_string()).collect(),
            retries_per_model: GENERATION_RETRIES_PER_MODEL,
            backoff_base: GENERATION_BACKOFF_BASE,
        }
    }
}

/// Runs `prompt` through each model in turn until one returns non-empty text.
///
/// Every failed attempt, including the last one for a model, is followed by
/// the backoff sleep before the next attempt.
///
/// # Errors
/// - [`ProctorError::Generation`] - Every attempt on every model failed
pub async fn generate_with_fallback(
    backend: &dyn GenerativeModel,
    policy: &RetryPolicy,
    prompt: &str,
) -> Result<String, ProctorError> {
    let mut attempts = 0u32;
    let mut last_error = String::from("no generation models configured");

    for model_id in &policy.models {
        for attempt in 0..policy.retries_per_model {
            attempts += 1;
            match backend.generate(model_id, prompt).await {
                Ok(text) if !text.trim().is_empty() => return Ok(text),
                Ok(_) => last_error = "No text found in model response".to_string(),
                Err(e) => last_error = e.to_string(),
            }
            warn!(
                model = %model_id,
                attempt = attempt + 1,
                error = %last_error,
                "generation attempt failed; retrying"
            );
            tokio::time::sleep(policy.backoff(attempt)).await;
        }
    }

    error!(attempts, "all generation models failed");
    Err(ProctorError::Generation {
        attempts,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct Scripted {
        replies: Mutex<Vec<Result<String, ProctorError>>>,
        calls: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(mut replies: Vec<Result<String, ProctorError>>) -> Self {
            replies.reverse();
            Self {
                replies: Mutex::new(replies),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl GenerativeModel for Scripted {
        async fn generate(&self, model_id: &str, _prompt: &str) -> Result<String, ProctorError> {
            self.calls.lock().unwrap().push(model_id.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(ProctorError::Transport("down".into())))
        }
    }

    #[test]
    fn backoff_doubles() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn falls_back_to_second_model() {
        let backend = Scripted::new(vec![
            Err(ProctorError::Transport("503".into())),
            Ok("   ".into()),
            Err(ProctorError::Transport("503".into())),
            Ok("[\"Q\"]".into()),
        ]);
        let started = tokio::time::Instant::now();
        let text = generate_with_fallback(&backend, &RetryPolicy::default(), "p")
            .await
            .unwrap();

        assert_eq!(text, "[\"Q\"]");
        let calls = backend.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                "gemini-2.5-flash",
                "gemini-2.5-flash",
                "gemini-2.5-flash",
                "gemini-2.5-pro"
            ]
        );
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(1 + 2 + 4));
        assert!(waited < Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausting_every_model_reports_attempts() {
        let backend = Scripted::new(Vec::new());
        let err = generate_with_fallback(&backend, &RetryPolicy::default(), "p")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ProctorError::Generation {
                attempts: 6,
                last_error: "Transport error: down".to_string()
            }
        );
    }
}
