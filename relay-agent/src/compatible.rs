//! OpenAI-compatible chat completions client.
//!
//! vLLM, llama.cpp server, LM Studio and most hosted APIs speak the same
//! `/chat/completions` format. The configured base URL already carries the
//! version prefix (e.g. `http://localhost:8555/v1`).

use crate::provider::{
    ChatMessage, ChatRequest, ChatResponse, Provider, ProviderError, ProviderErrorKind, TokenUsage,
};
use async_trait::async_trait;
use relay_common::config::InferenceConfig;
use relay_common::util::truncate_with_ellipsis;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Longest error body echoed into a `ProviderError` message.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// A provider that speaks the OpenAI-compatible chat completions API.
pub struct CompatibleProvider {
    name: String,
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

#[derive(Debug, Serialize)]
struct CompatibleRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f64,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    chat_template_kwargs: Option<ChatTemplateKwargs>,
}

/// vLLM passes these through to the model's chat template.
#[derive(Debug, Serialize)]
struct ChatTemplateKwargs {
    enable_thinking: bool,
}

#[derive(Debug, Deserialize)]
struct CompatibleResponse {
    #[serde(default)]
    choices: Vec<CompatibleChoice>,
    #[serde(default)]
    usage: Option<CompatibleUsage>,
}

#[derive(Debug, Deserialize)]
struct CompatibleChoice {
    message: CompatibleResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompatibleResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompatibleUsage {
    prompt_tokens: Option<i64>,
    completion_tokens: Option<i64>,
    total_tokens: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

impl CompatibleProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(name: &str, base_url: &str, api_key: Option<&str>, timeout: Duration) -> Self {
        Self {
            name: name.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key
                .filter(|k| !k.is_empty())
                .map(ToString::to_string),
            client: Client::builder()
                .timeout(timeout)
                .connect_timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_else(|_| Client::new()),
        }
    }

    /// Create the provider from the inference section of the config.
    pub fn from_config(config: &InferenceConfig) -> Self {
        Self::new(
            "vllm",
            &config.base_url,
            Some(config.api_key.as_str()),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.api_key {
            Some(ref key) => req.bearer_auth(key),
            None => req,
        }
    }

    fn transport_error(&self, model: &str, url: &str, e: &reqwest::Error) -> ProviderError {
        let kind = if e.is_timeout() {
            ProviderErrorKind::Timeout
        } else {
            ProviderErrorKind::Transport
        };
        ProviderError::new(
            &self.name,
            model,
            kind,
            format!("Request to {url} failed: {e}"),
        )
    }

    /// List the model ids served by the endpoint (`GET {base_url}/models`).
    pub async fn list_models(&self) -> Result<Vec<String>, ProviderError> {
        let url = format!("{}/models", self.base_url);

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| self.transport_error("-", &url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::new(
                &self.name,
                "-",
                ProviderErrorKind::Status,
                format!("Model listing failed ({})", status.as_u16()),
            )
            .with_status(status.as_u16()));
        }

        let list: ModelList = response.json().await.map_err(|e| {
            ProviderError::new(
                &self.name,
                "-",
                ProviderErrorKind::MalformedResponse,
                format!("Failed to parse model list: {e}"),
            )
        })?;

        Ok(list.data.into_iter().map(|m| m.id).collect())
    }
}

#[async_trait]
impl Provider for CompatibleProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let start = Instant::now();
        let url = format!("{}/chat/completions", self.base_url);

        let body = CompatibleRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            chat_template_kwargs: request.disable_thinking.then_some(ChatTemplateKwargs {
                enable_thinking: false,
            }),
        };

        tracing::debug!(
            provider = %self.name,
            model = %request.model,
            messages = request.messages.len(),
            "Sending chat completion request"
        );

        let response = self
            .authorize(self.client.post(&url).json(&body))
            .send()
            .await
            .map_err(|e| self.transport_error(&request.model, &url, &e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ProviderError::new(
                &self.name,
                &request.model,
                ProviderErrorKind::Status,
                format!(
                    "API error ({}): {}",
                    status.as_u16(),
                    truncate_with_ellipsis(&error_text, MAX_ERROR_BODY_CHARS)
                ),
            )
            .with_status(status.as_u16()));
        }

        let result: CompatibleResponse = response.json().await.map_err(|e| {
            let kind = if e.is_timeout() {
                ProviderErrorKind::Timeout
            } else {
                ProviderErrorKind::MalformedResponse
            };
            ProviderError::new(
                &self.name,
                &request.model,
                kind,
                format!("Failed to parse response: {e}"),
            )
        })?;

        let choice = result.choices.into_iter().next().ok_or_else(|| {
            ProviderError::new(
                &self.name,
                &request.model,
                ProviderErrorKind::MalformedResponse,
                "Response contained no choices",
            )
        })?;

        let content = choice
            .message
            .content
            .as_deref()
            .map(str::trim)
            .unwrap_or_default();
        if content.is_empty() {
            return Err(ProviderError::new(
                &self.name,
                &request.model,
                ProviderErrorKind::EmptyContent,
                format!(
                    "Empty completion (finish_reason: {})",
                    choice.finish_reason.as_deref().unwrap_or("unknown")
                ),
            ));
        }

        let usage = result.usage.map_or(TokenUsage::default(), |u| TokenUsage {
            input_tokens: u.prompt_tokens.unwrap_or(0),
            output_tokens: u.completion_tokens.unwrap_or(0),
            total_tokens: u.total_tokens.unwrap_or(0),
        });

        Ok(ChatResponse {
            provider: self.name.clone(),
            model: request.model,
            content: content.to_string(),
            usage,
            finish_reason: choice.finish_reason,
            latency_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn warmup(&self, model: &str) -> Result<(), ProviderError> {
        let models = self.list_models().await?;
        if models.iter().any(|m| m == model) {
            tracing::info!(provider = %self.name, model = %model, "Inference endpoint ready");
        } else {
            tracing::warn!(
                provider = %self.name,
                model = %model,
                available = ?models,
                "Configured model is not served by the inference endpoint"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Role;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> ChatRequest {
        ChatRequest {
            model: "Qwen/Qwen3-14b".into(),
            messages: vec![
                ChatMessage::system("You are helpful"),
                ChatMessage::user("Hello"),
            ],
            temperature: 0.7,
            max_tokens: 512,
            disable_thinking: true,
        }
    }

    fn provider_for(server: &MockServer) -> CompatibleProvider {
        CompatibleProvider::new(
            "vllm",
            &format!("{}/v1", server.uri()),
            Some("EMPTY"),
            Duration::from_secs(5),
        )
    }

    fn completion(content: serde_json::Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "choices": [{
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }))
    }

    #[test]
    fn strips_trailing_slash() {
        let provider = CompatibleProvider::new(
            "test",
            "https://api.example.com/v1/",
            Some("key"),
            Duration::from_secs(1),
        );
        assert_eq!(provider.base_url(), "https://api.example.com/v1");
    }

    #[test]
    fn from_config_uses_inference_settings() {
        let config = InferenceConfig::default();
        let provider = CompatibleProvider::from_config(&config);
        assert_eq!(provider.name(), "vllm");
        assert_eq!(provider.base_url(), "http://localhost:8555/v1");
    }

    #[test]
    fn request_serializes_thinking_flag() {
        let req = request();
        let body = CompatibleRequest {
            model: &req.model,
            messages: &req.messages,
            temperature: req.temperature,
            max_tokens: req.max_tokens,
            chat_template_kwargs: Some(ChatTemplateKwargs {
                enable_thinking: false,
            }),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["model"], "Qwen/Qwen3-14b");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["max_tokens"], 512);
        assert_eq!(json["chat_template_kwargs"]["enable_thinking"], false);
    }

    #[test]
    fn response_deserializes_null_content() {
        let json = r#"{"choices": [{"message": {"content": null}, "finish_reason": "length"}]}"#;
        let resp: CompatibleResponse = serde_json::from_str(json).unwrap();
        assert!(resp.choices[0].message.content.is_none());
    }

    #[tokio::test]
    async fn chat_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer EMPTY"))
            .and(body_partial_json(serde_json::json!({
                "model": "Qwen/Qwen3-14b",
                "temperature": 0.7,
                "max_tokens": 512,
                "chat_template_kwargs": {"enable_thinking": false}
            })))
            .respond_with(completion(serde_json::json!("  Hello there!\n")))
            .expect(1)
            .mount(&server)
            .await;

        let response = provider_for(&server).chat(request()).await.unwrap();
        assert_eq!(response.content, "Hello there!");
        assert_eq!(response.provider, "vllm");
        assert_eq!(response.usage.total_tokens, 15);
        assert_eq!(response.finish_reason.as_deref(), Some("stop"));
    }

    #[tokio::test]
    async fn chat_without_thinking_flag_omits_kwargs() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(completion(serde_json::json!("ok")))
            .mount(&server)
            .await;

        let mut req = request();
        req.disable_thinking = false;
        provider_for(&server).chat(req).await.unwrap();

        let received = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
        assert!(body.get("chat_template_kwargs").is_none());
        assert_eq!(body["messages"][1]["role"], Role::User.as_str());
    }

    #[tokio::test]
    async fn chat_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_string(r#"{"error": "The model `Qwen/Qwen3-14b` does not exist."}"#),
            )
            .mount(&server)
            .await;

        let err = provider_for(&server).chat(request()).await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Status);
        assert_eq!(err.status_code, Some(404));
        assert!(err.message.contains("does not exist"));
    }

    #[tokio::test]
    async fn chat_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy</html>"))
            .mount(&server)
            .await;

        let err = provider_for(&server).chat(request()).await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::MalformedResponse);
    }

    #[tokio::test]
    async fn chat_no_choices() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": []
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server).chat(request()).await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::MalformedResponse);
    }

    #[tokio::test]
    async fn chat_empty_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(completion(serde_json::json!("   ")))
            .mount(&server)
            .await;

        let err = provider_for(&server).chat(request()).await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::EmptyContent);
    }

    #[tokio::test]
    async fn chat_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(completion(serde_json::json!("late")).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let provider = CompatibleProvider::new(
            "vllm",
            &format!("{}/v1", server.uri()),
            None,
            Duration::from_millis(200),
        );
        let err = provider.chat(request()).await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Timeout);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn chat_unreachable_endpoint() {
        let provider = CompatibleProvider::new(
            "vllm",
            "http://127.0.0.1:9/v1",
            None,
            Duration::from_secs(2),
        );
        let err = provider.chat(request()).await.unwrap_err();
        assert!(matches!(
            err.kind,
            ProviderErrorKind::Transport | ProviderErrorKind::Timeout
        ));
    }

    #[tokio::test]
    async fn list_models_and_warmup() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"id": "Qwen/Qwen3-14b"}, {"id": "other"}]
            })))
            .mount(&server)
            .await;

        let provider = provider_for(&server);
        let models = provider.list_models().await.unwrap();
        assert_eq!(models, vec!["Qwen/Qwen3-14b", "other"]);
        assert!(provider.warmup("missing-model").await.is_ok());
    }

    #[tokio::test]
    async fn warmup_fails_when_endpoint_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = provider_for(&server).warmup("Qwen/Qwen3-14b").await.unwrap_err();
        assert_eq!(err.status_code, Some(401));
    }
}
