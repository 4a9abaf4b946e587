//! [`ChatProvider`] over the `OpenAI` chat completions endpoint.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER};
use tracing::{debug, error};

use crate::messages::ChatMessage;
use crate::provider::{ChatProvider, CompletionOptions, ProviderError, ProviderResult};

use super::types::{ChatCompletionRequest, ChatCompletionResponse, OpenAiConfig};

/// Retry delay assumed when a 429 carries no usable `retry-after` header.
const DEFAULT_RETRY_AFTER_MS: u64 = 1_000;

/// Chat completions client.
pub struct OpenAiChatProvider {
    config: OpenAiConfig,
    client: reqwest::Client,
    base_url: String,
}

impl OpenAiChatProvider {
    /// Create a provider with a fresh HTTP client.
    pub fn new(config: OpenAiConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    /// Create a provider reusing an existing HTTP client.
    pub fn with_client(config: OpenAiConfig, client: reqwest::Client) -> Self {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Self {
            config,
            client,
            base_url,
        }
    }

    fn build_headers(&self) -> ProviderResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = self.config.api_key.as_deref() {
            let value = HeaderValue::from_str(&format!("Bearer {key}")).map_err(|e| {
                ProviderError::Auth {
                    message: format!("invalid API key header: {e}"),
                }
            })?;
            let _ = headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }
}

#[async_trait]
impl ChatProvider for OpenAiChatProvider {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> ProviderResult<String> {
        let model = options.model.as_deref().unwrap_or(&self.config.model);
        let request = ChatCompletionRequest {
            model,
            messages,
            temperature: options.temperature.unwrap_or(self.config.temperature),
            max_tokens: options.max_tokens.unwrap_or(self.config.max_tokens),
        };
        let url = format!("{}/chat/completions", self.base_url);

        debug!(
            model,
            message_count = messages.len(),
            max_tokens = request.max_tokens,
            "sending chat completion"
        );

        let response = self
            .client
            .post(&url)
            .headers(self.build_headers()?)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_ms = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let body = response.text().await.unwrap_or_default();
            let message = parse_api_error(&body, status.as_u16());
            error!(status = status.as_u16(), %message, "chat completion failed");
            return Err(match status.as_u16() {
                401 | 403 => ProviderError::Auth { message },
                429 => ProviderError::RateLimited {
                    retry_after_ms: retry_after_ms.unwrap_or(DEFAULT_RETRY_AFTER_MS),
                    message,
                },
                code => ProviderError::Api {
                    status: code,
                    message,
                    retryable: code >= 500,
                },
            });
        }

        let body: ChatCompletionResponse = response.json().await?;
        body.first_text().ok_or(ProviderError::EmptyResponse)
    }
}

/// Parse a `retry-after` header given in seconds.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // finite, non-negative seconds
fn parse_retry_after(value: &str) -> Option<u64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| (secs * 1000.0).round() as u64)
}

/// Extract a human-readable message from an error body.
fn parse_api_error(body: &str, status: u16) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| json["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| {
            if body.is_empty() {
                format!("HTTP {status}")
            } else {
                format!("HTTP {status}: {body}")
            }
        })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> OpenAiChatProvider {
        OpenAiChatProvider::new(OpenAiConfig {
            base_url: format!("{}/v1/", server.uri()),
            api_key: Some("sk-test".into()),
            ..OpenAiConfig::default()
        })
    }

    // ── parse helpers ───────────────────────────────────────────────

    #[test]
    fn parse_api_error_json() {
        let body = r#"{"error":{"type":"server_error","message":"Internal error"}}"#;
        assert_eq!(parse_api_error(body, 500), "Internal error");
    }

    #[test]
    fn parse_api_error_non_json() {
        assert_eq!(parse_api_error("Bad Gateway", 502), "HTTP 502: Bad Gateway");
        assert_eq!(parse_api_error("", 500), "HTTP 500");
    }

    #[test]
    fn parse_retry_after_seconds() {
        assert_eq!(parse_retry_after("2"), Some(2000));
        assert_eq!(parse_retry_after(" 0.5 "), Some(500));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
        assert_eq!(parse_retry_after("-1"), None);
    }

    // ── HTTP ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn complete_returns_first_choice() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-4o-mini",
                "max_tokens": 400,
                "messages": [{"role": "user", "content": "Summarize"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "Solid work."}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = provider_for(&server)
            .complete(
                &[ChatMessage::user("Summarize")],
                &CompletionOptions::with_max_tokens(400),
            )
            .await
            .unwrap();
        assert_eq!(reply, "Solid work.");
    }

    #[tokio::test]
    async fn empty_content_is_empty_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": ""}}]
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .complete(&[ChatMessage::user("q")], &CompletionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::EmptyResponse));
    }

    #[tokio::test]
    async fn rate_limit_reads_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "3")
                    .set_body_json(serde_json::json!({"error": {"message": "slow down"}})),
            )
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .complete(&[ChatMessage::user("q")], &CompletionOptions::default())
            .await
            .unwrap_err();
        match err {
            ProviderError::RateLimited {
                retry_after_ms,
                message,
            } => {
                assert_eq!(retry_after_ms, 3000);
                assert_eq!(message, "slow down");
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unauthorized_maps_to_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .complete(&[ChatMessage::user("q")], &CompletionOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Auth { .. }));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn server_error_is_retryable_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .complete(&[ChatMessage::user("q")], &CompletionOptions::default())
            .await
            .unwrap_err();
        match &err {
            ProviderError::Api {
                status, retryable, ..
            } => {
                assert_eq!(*status, 503);
                assert!(*retryable);
            }
            other => panic!("expected Api, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn options_override_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({"model": "local-llama"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"content": "ok"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let options = CompletionOptions {
            model: Some("local-llama".into()),
            ..CompletionOptions::default()
        };
        let reply = provider_for(&server)
            .complete(&[ChatMessage::user("q")], &options)
            .await
            .unwrap();
        assert_eq!(reply, "ok");
    }
}
