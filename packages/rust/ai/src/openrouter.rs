//! OpenRouter chat-completions client.
//!
//! Thin reqwest wrapper speaking the OpenAI-compatible
//! `POST {base_url}/chat/completions` shape, mapping HTTP failures onto the
//! [`AiError`] taxonomy the retry policy understands.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::{AiClient, CompletionRequest};
use crate::error::AiError;

/// Configuration for [`OpenRouterClient`].
#[derive(Debug, Clone)]
pub struct OpenRouterConfig {
    /// API base URL, e.g. `https://openrouter.ai/api/v1`.
    pub base_url: String,
    /// Bearer API key.
    pub api_key: String,
    /// Model ID, e.g. `moonshotai/kimi-k2.5`.
    pub model: String,
    /// Per-call timeout.
    pub timeout: Duration,
}

/// OpenRouter-backed [`AiClient`].
pub struct OpenRouterClient {
    config: OpenRouterConfig,
    client: reqwest::Client,
}

impl OpenRouterClient {
    /// Build a client with its own connection pool and timeout.
    pub fn new(config: OpenRouterConfig) -> Result<Self, AiError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("QuizForge/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| AiError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }
}

impl AiClient for OpenRouterClient {
    fn complete(
        &self,
        req: &CompletionRequest,
    ) -> impl Future<Output = Result<String, AiError>> + Send {
        let body = ChatRequest::from_completion(&self.config.model, req);
        let request = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&body);

        async move {
            let response = request.send().await.map_err(classify_reqwest_error)?;

            let status = response.status();
            if status.as_u16() == 429 {
                return Err(AiError::RateLimited);
            }
            if !status.is_success() {
                let message = response.text().await.unwrap_or_default();
                return Err(AiError::Provider {
                    status: status.as_u16(),
                    message: truncate(&message, 300),
                });
            }

            let parsed: ChatResponse = response
                .json()
                .await
                .map_err(|e| AiError::InvalidResponse(format!("malformed response body: {e}")))?;

            let text = parsed
                .choices
                .into_iter()
                .next()
                .map(|c| c.message.content)
                .ok_or_else(|| AiError::InvalidResponse("response had no choices".into()))?;

            debug!(chars = text.len(), "completion received");
            Ok(text)
        }
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> AiError {
    if e.is_timeout() {
        AiError::Timeout
    } else {
        AiError::Transport(e.to_string())
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s[..end].to_string()
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

impl ChatRequest {
    fn from_completion(model: &str, req: &CompletionRequest) -> Self {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &req.system {
            messages.push(ChatMessage {
                role: "system".into(),
                content: system.clone(),
            });
        }
        messages.push(ChatMessage {
            role: "user".into(),
            content: req.prompt.clone(),
        });

        Self {
            model: model.to_string(),
            messages,
            max_tokens: req.max_tokens,
            temperature: req.temperature,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{bearer_token, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> OpenRouterClient {
        OpenRouterClient::new(OpenRouterConfig {
            base_url: server.uri(),
            api_key: "test-key".into(),
            model: "test/model".into(),
            timeout: Duration::from_secs(5),
        })
        .expect("build client")
    }

    #[tokio::test]
    async fn successful_completion_extracts_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(bearer_token("test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "hello"}}]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let text = client
            .complete(&CompletionRequest::new("hi"))
            .await
            .expect("completion");
        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn status_429_maps_to_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .complete(&CompletionRequest::new("hi"))
            .await
            .expect_err("rate limited");
        assert!(matches!(err, AiError::RateLimited));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn status_500_is_transient_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .complete(&CompletionRequest::new("hi"))
            .await
            .expect_err("provider error");
        assert!(matches!(err, AiError::Provider { status: 502, .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn empty_choices_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"choices": []})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .complete(&CompletionRequest::new("hi"))
            .await
            .expect_err("no choices");
        assert!(matches!(err, AiError::InvalidResponse(_)));
    }

    #[test]
    fn system_prompt_becomes_first_message() {
        let req = CompletionRequest::new("user text").with_system("be terse");
        let body = ChatRequest::from_completion("m", &req);
        assert_eq!(body.messages.len(), 2);
        assert_eq!(body.messages[0].role, "system");
        assert_eq!(body.messages[1].content, "user text");
    }
}
