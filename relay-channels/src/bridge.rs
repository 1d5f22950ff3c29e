//! Bridge between the chat channel and the inference endpoint.
//!
//! One inbound text message is one exchange: the user's history and the new
//! message go to the model, the reply is recorded and sent back in chunks.
//! Commands are answered locally and never reach the model.

use crate::history::HistoryStore;
use crate::message::{ChannelMessage, MessageContent};
use crate::split::split_message;
use crate::traits::Channel;
use relay_agent::{ChatMessage, ChatRequest, Provider, ProviderError};
use relay_common::{api_call_span, channel_span};
use relay_common::config::Config;
use relay_common::util::truncate_with_ellipsis;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::Instrument;

/// Characters of user/model text shown in logs.
const LOG_PREVIEW_CHARS: usize = 50;

const HELP_TEXT: &str = "Send me any text and I will answer with the language model.\n\n\
Commands:\n\
/start - start over and show the greeting\n\
/reset - forget the conversation history (alias: /clear)\n\
/help - show this message";

// ============================================================================
// Settings
// ============================================================================

/// Per-exchange settings, taken from the config at startup.
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub disable_thinking: bool,
    pub system_prompt: String,
    /// Longest message the channel accepts, in chars
    pub max_message_len: usize,
    pub greeting: String,
    pub reset_message: String,
    /// The one reply sent when an exchange fails
    pub error_message: String,
}

impl BridgeSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.inference.model.clone(),
            temperature: config.inference.temperature,
            max_tokens: config.inference.max_tokens,
            disable_thinking: config.inference.disable_thinking,
            system_prompt: config.conversation.system_prompt.clone(),
            max_message_len: config.conversation.max_message_len,
            greeting: config.conversation.greeting.clone(),
            reset_message: config.conversation.reset_message.clone(),
            error_message: config.conversation.error_message.clone(),
        }
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// What handling one inbound message did.
#[derive(Debug, Clone)]
pub enum ExchangeOutcome {
    /// The model answered; history was updated and these chunks were sent.
    Replied { chunks: Vec<String> },
    /// The model call failed; history is unchanged and the error message was sent.
    Failed { error: ProviderError },
    /// A command was answered without calling the model.
    Command { name: String },
}

// ============================================================================
// Bridge
// ============================================================================

/// Runs exchanges between a channel and an inference provider.
pub struct InferenceBridge<C: Channel> {
    provider: Arc<dyn Provider>,
    channel: Arc<C>,
    history: HistoryStore,
    settings: BridgeSettings,
}

impl<C: Channel + 'static> InferenceBridge<C> {
    /// Create a new bridge with an empty history store of depth `history_depth`.
    pub fn new(
        provider: Arc<dyn Provider>,
        channel: Arc<C>,
        settings: BridgeSettings,
        history_depth: usize,
    ) -> Self {
        Self {
            provider,
            channel,
            history: HistoryStore::new(history_depth),
            settings,
        }
    }

    /// Create a bridge from the loaded config.
    pub fn from_config(provider: Arc<dyn Provider>, channel: Arc<C>, config: &Config) -> Self {
        Self::new(
            provider,
            channel,
            BridgeSettings::from_config(config),
            config.conversation.history_depth,
        )
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn settings(&self) -> &BridgeSettings {
        &self.settings
    }

    /// Handle one inbound message inside its trace span.
    pub async fn handle(&self, message: ChannelMessage) -> ExchangeOutcome {
        let span = channel_span!(
            message.channel_type.as_str(),
            message.trace_id,
            message.user_id,
            span_id = %message.span_id,
            chat_id = %message.channel_id
        );

        async move {
            match message.content {
                MessageContent::Text { ref text } => self.exchange(&message, text).await,
                MessageContent::Command { ref name, .. } => {
                    self.command(&message.user_id, &message.channel_id, name)
                        .await
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Run one model exchange for `text`.
    async fn exchange(&self, message: &ChannelMessage, text: &str) -> ExchangeOutcome {
        let user_id = message.user_id.as_str();
        let chat_id = message.channel_id.as_str();

        let mut history = self.history.get(user_id);
        HistoryStore::trim(&mut history, self.history.max_turns());
        let history_turns = history.len();

        let mut messages = Vec::with_capacity(history_turns + 2);
        messages.push(ChatMessage::system(self.settings.system_prompt.as_str()));
        messages.extend(history);
        messages.push(ChatMessage::user(text));

        let request = ChatRequest {
            model: self.settings.model.clone(),
            messages,
            temperature: self.settings.temperature,
            max_tokens: self.settings.max_tokens,
            disable_thinking: self.settings.disable_thinking,
        };

        tracing::info!(
            history_turns,
            text = %truncate_with_ellipsis(text, LOG_PREVIEW_CHARS),
            "Sending request to inference endpoint"
        );

        let span = api_call_span!(
            message.trace_id,
            provider = self.provider.name(),
            model = %self.settings.model
        );

        match self.provider.chat(request).instrument(span).await {
            Ok(response) => {
                tracing::info!(
                    latency_ms = response.latency_ms,
                    output_tokens = response.usage.output_tokens,
                    reply = %truncate_with_ellipsis(&response.content, LOG_PREVIEW_CHARS),
                    "Received model reply"
                );

                self.history.append(
                    user_id,
                    ChatMessage::user(text),
                    ChatMessage::assistant(response.content.as_str()),
                );

                let chunks = split_message(&response.content, self.settings.max_message_len);
                self.deliver(chat_id, &chunks).await;
                ExchangeOutcome::Replied { chunks }
            }
            Err(error) => {
                tracing::error!(
                    provider = %error.provider,
                    model = %error.model,
                    kind = ?error.kind,
                    status = ?error.status_code,
                    retryable = error.is_retryable(),
                    error = %error.message,
                    "Inference request failed"
                );

                self.deliver(chat_id, &[self.settings.error_message.clone()])
                    .await;
                ExchangeOutcome::Failed { error }
            }
        }
    }

    /// Answer a bot command.
    async fn command(&self, user_id: &str, chat_id: &str, name: &str) -> ExchangeOutcome {
        let reply = match name {
            "start" => {
                self.history.reset(user_id);
                self.settings.greeting.clone()
            }
            "reset" | "clear" => {
                self.history.reset(user_id);
                self.settings.reset_message.clone()
            }
            "help" => HELP_TEXT.to_string(),
            other => format!("Unknown command /{other}. Send /help for the list of commands."),
        };

        tracing::info!(command = %name, "Handled command");

        let chunks = split_message(&reply, self.settings.max_message_len);
        self.deliver(chat_id, &chunks).await;
        ExchangeOutcome::Command {
            name: name.to_string(),
        }
    }

    /// Send chunks in order, abandoning the rest after the first failure.
    async fn deliver(&self, chat_id: &str, chunks: &[String]) {
        for (index, chunk) in chunks.iter().enumerate() {
            if let Err(e) = self.channel.send_text(chat_id, chunk).await {
                tracing::error!(
                    channel = self.channel.name(),
                    chunk = index + 1,
                    total = chunks.len(),
                    error = %e,
                    "Failed to send reply chunk"
                );
                return;
            }
        }
    }

    /// Spawn the dispatcher: one task per inbound message.
    pub fn spawn_processor(
        bridge: Arc<Self>,
        mut rx: mpsc::Receiver<ChannelMessage>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!("Inference bridge processor started");

            while let Some(message) = rx.recv().await {
                let bridge = bridge.clone();

                // Process each message in its own task
                tokio::spawn(async move {
                    bridge.handle(message).await;
                });
            }

            tracing::info!("Inference bridge processor stopped");
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
