//! Relay Agent - inference client for the vLLM relay.
//!
//! Provides:
//! - The `Provider` trait the bridge calls for each exchange
//! - Request/response types for chat completions
//! - `CompatibleProvider`, a client for OpenAI-compatible endpoints (vLLM)
//!
//! ## Example
//!
//! ```ignore
//! use relay_agent::{ChatMessage, ChatRequest, CompatibleProvider, Provider};
//!
//! let provider = CompatibleProvider::from_config(&config.inference);
//! let response = provider
//!     .chat(ChatRequest {
//!         model: config.inference.model.clone(),
//!         messages: vec![ChatMessage::system(prompt), ChatMessage::user("Hello!")],
//!         temperature: 0.7,
//!         max_tokens: 512,
//!         disable_thinking: true,
//!     })
//!     .await?;
//! ```

pub mod compatible;
pub mod provider;

pub use compatible::CompatibleProvider;
pub use provider::{
    ChatMessage, ChatRequest, ChatResponse, Provider, ProviderError, ProviderErrorKind, Role,
    TokenUsage,
};
