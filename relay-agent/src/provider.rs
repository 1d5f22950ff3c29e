//! Provider trait for LLM backends.
//!
//! Defines the request/response types and the interface the relay uses to
//! reach a chat-completion endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ============================================================================
// Messages
// ============================================================================

/// Message role in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Leading instruction, never stored in a user's history
    System,
    User,
    Assistant,
}

impl Role {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single message in a chat request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model to use
    pub model: String,
    /// Messages in order, system instruction first
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature
    pub temperature: f64,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Ask the chat template not to emit a reasoning section
    #[serde(default)]
    pub disable_thinking: bool,
}

/// Chat completion response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Provider name
    pub provider: String,
    /// Model used
    pub model: String,
    /// Response content, whitespace-trimmed and never empty
    pub content: String,
    /// Token usage
    pub usage: TokenUsage,
    /// Finish reason
    pub finish_reason: Option<String>,
    /// Response latency in milliseconds
    pub latency_ms: u64,
}

/// Token usage information.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub total_tokens: i64,
}

// ============================================================================
// Errors
// ============================================================================

/// What went wrong with a provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Connection refused, DNS failure, TLS error, ...
    Transport,
    /// The request did not complete within the client timeout
    Timeout,
    /// Non-2xx HTTP status
    Status,
    /// Body was not a valid completion payload
    MalformedResponse,
    /// Completion had no content
    EmptyContent,
}

/// Error from a provider.
#[derive(Debug, Clone)]
pub struct ProviderError {
    pub provider: String,
    pub model: String,
    pub kind: ProviderErrorKind,
    pub message: String,
    pub status_code: Option<u16>,
}

impl ProviderError {
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        kind: ProviderErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            kind,
            message: message.into(),
            status_code: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    /// Whether a later attempt could plausibly succeed.
    ///
    /// Only reported in logs; the relay never retries on its own.
    pub fn is_retryable(&self) -> bool {
        match self.kind {
            ProviderErrorKind::Transport | ProviderErrorKind::Timeout => true,
            ProviderErrorKind::Status => {
                matches!(self.status_code, Some(429) | Some(500..=599))
            }
            ProviderErrorKind::MalformedResponse | ProviderErrorKind::EmptyContent => false,
        }
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}:{}] {}", self.provider, self.model, self.message)
    }
}

impl std::error::Error for ProviderError {}

// ============================================================================
// Provider Trait
// ============================================================================

/// LLM provider trait.
///
/// Implementations handle authentication, request formatting and response
/// parsing for a specific API.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Provider name (e.g., "vllm").
    fn name(&self) -> &str;

    /// Send a chat completion request.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError>;

    /// Check the endpoint before serving (reachability, model availability).
    async fn warmup(&self, _model: &str) -> Result<(), ProviderError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockProvider;

    #[async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError> {
            let last = request.messages.last().map(|m| m.content.clone());
            Ok(ChatResponse {
                provider: "mock".into(),
                model: request.model,
                content: format!("Echo: {}", last.unwrap_or_default()),
                usage: TokenUsage::default(),
                finish_reason: Some("stop".into()),
                latency_ms: 0,
            })
        }
    }

    #[tokio::test]
    async fn mock_provider_works() {
        let provider = MockProvider;
        assert_eq!(provider.name(), "mock");

        let response = provider
            .chat(ChatRequest {
                model: "test".into(),
                messages: vec![ChatMessage::system("be brief"), ChatMessage::user("Hello")],
                temperature: 0.7,
                max_tokens: 16,
                disable_thinking: true,
            })
            .await
            .unwrap();
        assert_eq!(response.content, "Echo: Hello");
    }

    #[tokio::test]
    async fn warmup_default_succeeds() {
        assert!(MockProvider.warmup("any-model").await.is_ok());
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::assistant("hi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
        assert_eq!(Role::User.to_string(), "user");
    }

    #[test]
    fn error_display_and_retryability() {
        let err = ProviderError::new("vllm", "qwen", ProviderErrorKind::Status, "API error (503)")
            .with_status(503);
        assert_eq!(err.to_string(), "[vllm:qwen] API error (503)");
        assert!(err.is_retryable());

        let err = ProviderError::new("vllm", "qwen", ProviderErrorKind::Status, "API error (404)")
            .with_status(404);
        assert!(!err.is_retryable());

        let err = ProviderError::new("vllm", "qwen", ProviderErrorKind::EmptyContent, "empty");
        assert!(!err.is_retryable());
        assert!(ProviderError::new("vllm", "qwen", ProviderErrorKind::Timeout, "t").is_retryable());
    }
}
