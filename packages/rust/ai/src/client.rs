//! The AI-capability seam consumed by the pipeline stages.
//!
//! Stages receive an explicit [`AiClient`] handle rather than reaching for
//! global state, so tests substitute a scripted fake and production wires in
//! [`crate::OpenRouterClient`].

use quizforge_shared::{CancelToken, RetryPolicy};
use tracing::warn;

use crate::error::AiError;

/// A single completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// User prompt text.
    pub prompt: String,
    /// Optional system prompt.
    pub system: Option<String>,
    /// Upper bound on generated tokens.
    pub max_tokens: Option<u32>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
}

impl CompletionRequest {
    /// A plain request with default sampling options.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            system: None,
            max_tokens: None,
            temperature: None,
        }
    }

    /// Attach a system prompt.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// Text-generation capability: `complete(prompt) -> string`.
///
/// Implementations must be cheap to share (`&self` calls) and safe to invoke
/// concurrently up to the caller's concurrency bound.
pub trait AiClient: Send + Sync + 'static {
    /// Run one completion. Errors follow the [`AiError`] taxonomy so the
    /// caller's retry policy can classify them.
    fn complete(
        &self,
        req: &CompletionRequest,
    ) -> impl Future<Output = Result<String, AiError>> + Send;
}

/// Run a completion under a retry policy, backing off on transient errors
/// and racing the whole thing against cancellation.
///
/// Non-transient errors return immediately; an exhausted policy returns the
/// last error seen.
pub async fn complete_with_retry<C: AiClient>(
    client: &C,
    req: &CompletionRequest,
    policy: &RetryPolicy,
    cancel: &CancelToken,
) -> Result<String, AiError> {
    let mut attempt = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(AiError::Cancelled);
        }

        let result = tokio::select! {
            res = client.complete(req) => res,
            _ = cancel.cancelled() => Err(AiError::Cancelled),
        };

        match result {
            Ok(text) => return Ok(text),
            Err(err) if err.is_transient() => match policy.delay_for(attempt) {
                Some(delay) => {
                    warn!(attempt, error = %err, "transient AI error, backing off");
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => return Err(AiError::Cancelled),
                    }
                    attempt += 1;
                }
                None => return Err(err),
            },
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedAi;

    #[tokio::test(start_paused = true)]
    async fn retries_transient_then_succeeds() {
        let ai = ScriptedAi::new(vec![
            Err(AiError::RateLimited),
            Err(AiError::Timeout),
            Ok("answer".into()),
        ]);
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 10,
            backoff_multiplier: 2.0,
        };
        let cancel = CancelToken::new();
        let req = CompletionRequest::new("prompt");

        let text = complete_with_retry(&ai, &req, &policy, &cancel)
            .await
            .expect("should succeed on third attempt");
        assert_eq!(text, "answer");
        assert_eq!(ai.calls(), 3);
    }

    #[tokio::test]
    async fn non_transient_error_fails_fast() {
        let ai = ScriptedAi::new(vec![
            Err(AiError::InvalidResponse("garbage".into())),
            Ok("never reached".into()),
        ]);
        let cancel = CancelToken::new();
        let req = CompletionRequest::new("prompt");

        let err = complete_with_retry(&ai, &req, &RetryPolicy::default(), &cancel)
            .await
            .expect_err("must not retry invalid responses");
        assert!(matches!(err, AiError::InvalidResponse(_)));
        assert_eq!(ai.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_policy_returns_last_error() {
        let ai = ScriptedAi::always(AiError::RateLimited);
        let policy = RetryPolicy {
            max_attempts: 2,
            base_delay_ms: 5,
            backoff_multiplier: 1.0,
        };
        let cancel = CancelToken::new();
        let req = CompletionRequest::new("prompt");

        let err = complete_with_retry(&ai, &req, &policy, &cancel)
            .await
            .expect_err("policy exhausted");
        assert!(matches!(err, AiError::RateLimited));
        assert_eq!(ai.calls(), 2);
    }

    #[tokio::test]
    async fn pre_cancelled_token_short_circuits() {
        let ai = ScriptedAi::new(vec![Ok("unused".into())]);
        let cancel = CancelToken::new();
        cancel.cancel();
        let req = CompletionRequest::new("prompt");

        let err = complete_with_retry(&ai, &req, &RetryPolicy::default(), &cancel)
            .await
            .expect_err("cancelled");
        assert!(matches!(err, AiError::Cancelled));
        assert_eq!(ai.calls(), 0);
    }
}
