//! Telegram channel adapter.
//!
//! Long-polls the Bot API with `getUpdates` and replies with plain-text
//! `sendMessage` calls.

use crate::message::{ChannelMessage, ChannelType, MessageContent};
use crate::traits::{Channel, ChannelError, ChannelResult};
use async_trait::async_trait;
use relay_common::logging::{generate_span_id, generate_trace_id};
use relay_common::util::{redact_secret, truncate_with_ellipsis};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Pause after a failed poll before trying again.
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Headroom on top of the long-poll timeout for the HTTP client.
const CLIENT_TIMEOUT_SLACK_SECS: u64 = 15;

/// Telegram channel - long-polls the Bot API for updates.
pub struct TelegramChannel {
    bot_token: String,
    allowed_users: Vec<String>,
    api_base: String,
    poll_timeout_secs: u64,
    client: reqwest::Client,
    running: AtomicBool,
}

/// The parts of a Telegram text message the relay uses.
#[derive(Debug, Clone, PartialEq, Eq)]
struct IncomingText {
    chat_id: String,
    user_id: Option<String>,
    username: Option<String>,
    text: String,
}

impl TelegramChannel {
    /// Create a new Telegram channel.
    pub fn new(bot_token: String, allowed_users: Vec<String>) -> Self {
        Self {
            bot_token,
            allowed_users,
            api_base: DEFAULT_API_BASE.to_string(),
            poll_timeout_secs: 30,
            client: build_client(30),
            running: AtomicBool::new(false),
        }
    }

    /// Point the channel at a different Bot API server.
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    /// Set the `getUpdates` long-poll timeout.
    pub fn with_poll_timeout(mut self, secs: u64) -> Self {
        self.poll_timeout_secs = secs;
        self.client = build_client(secs);
        self
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.bot_token)
    }

    /// Strip the bot token from anything that may echo a request URL.
    fn redact(&self, text: &str) -> String {
        redact_secret(text, &self.bot_token)
    }

    fn is_user_allowed(&self, identity: &str) -> bool {
        self.allowed_users
            .iter()
            .any(|u| u == "*" || u.trim_start_matches('@') == identity)
    }

    fn is_any_user_allowed<'a, I>(&self, identities: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        identities.into_iter().any(|id| self.is_user_allowed(id))
    }

    /// Fetch one batch of updates starting at `offset`.
    async fn poll_updates(&self, offset: i64) -> Result<Vec<Value>, String> {
        let body = serde_json::json!({
            "offset": offset,
            "timeout": self.poll_timeout_secs,
            "allowed_updates": ["message"]
        });

        let resp = self
            .client
            .post(self.api_url("getUpdates"))
            .json(&body)
            .send()
            .await
            .map_err(|e| self.redact(&e.to_string()))?;

        let data: Value = resp.json().await.map_err(|e| self.redact(&e.to_string()))?;

        if data.get("ok").and_then(Value::as_bool) != Some(true) {
            let description = data
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            return Err(format!("getUpdates rejected: {description}"));
        }

        Ok(data
            .get("result")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    /// Turn one update into a channel message, applying the sender filter.
    fn to_channel_message(&self, update: &Value) -> Option<ChannelMessage> {
        let Some(incoming) = parse_text_message(update) else {
            tracing::debug!("Telegram: skipping update without text");
            return None;
        };

        let identities = incoming
            .username
            .iter()
            .chain(incoming.user_id.iter())
            .map(String::as_str);
        if !self.is_any_user_allowed(identities) {
            tracing::warn!(
                "Telegram: ignoring message from unauthorized user: {}",
                incoming
                    .username
                    .as_deref()
                    .or(incoming.user_id.as_deref())
                    .unwrap_or("unknown")
            );
            return None;
        }

        let user_id = incoming
            .user_id
            .clone()
            .or_else(|| incoming.username.clone())
            .unwrap_or_else(|| incoming.chat_id.clone());

        let msg = ChannelMessage {
            id: uuid::Uuid::new_v4().to_string(),
            channel_type: ChannelType::Telegram,
            channel_id: incoming.chat_id,
            user_id,
            username: incoming.username,
            content: MessageContent::from_text(&incoming.text),
            timestamp: chrono::Utc::now().timestamp_millis(),
            trace_id: generate_trace_id(),
            span_id: generate_span_id(),
        };

        tracing::info!(
            channel = "telegram",
            trace_id = %msg.trace_id,
            span_id = %msg.span_id,
            user_id = %msg.user_id,
            chat_id = %msg.channel_id,
            text = %truncate_with_ellipsis(&incoming.text, 50),
            "IM message received"
        );

        Some(msg)
    }
}

fn build_client(poll_timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(
            poll_timeout_secs + CLIENT_TIMEOUT_SLACK_SECS,
        ))
        .connect_timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Extract chat, sender and text from an update. Non-text updates yield `None`.
fn parse_text_message(update: &Value) -> Option<IncomingText> {
    let message = update.get("message")?;
    let text = message.get("text")?.as_str()?;

    let chat_id = message.get("chat")?.get("id")?.as_i64()?.to_string();

    let from = message.get("from");
    let user_id = from
        .and_then(|f| f.get("id"))
        .and_then(Value::as_i64)
        .map(|id| id.to_string());
    let username = from
        .and_then(|f| f.get("username"))
        .and_then(Value::as_str)
        .map(String::from);

    Some(IncomingText {
        chat_id,
        user_id,
        username,
        text: text.to_string(),
    })
}

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn init(&mut self) -> ChannelResult<()> {
        // Verify bot token by calling getMe
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::Connection(self.redact(&e.to_string())))?;

        if !resp.status().is_success() {
            let err = resp.text().await.unwrap_or_default();
            return Err(ChannelError::Auth(format!("Invalid bot token: {err}")));
        }

        let me: Value = resp
            .json()
            .await
            .map_err(|e| ChannelError::Connection(self.redact(&e.to_string())))?;
        let bot_name = me
            .get("result")
            .and_then(|r| r.get("username"))
            .and_then(Value::as_str)
            .unwrap_or("unknown");

        tracing::info!(bot = %bot_name, "Telegram channel initialized");
        Ok(())
    }

    async fn send_text(&self, chat_id: &str, text: &str) -> ChannelResult<()> {
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": text
        });

        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed(self.redact(&e.to_string())))?;

        if resp.status().is_success() {
            return Ok(());
        }

        let status = resp.status();
        let error_text = resp.text().await.unwrap_or_default();
        Err(ChannelError::SendFailed(format!(
            "sendMessage returned {}: {error_text}",
            status.as_u16()
        )))
    }

    async fn listen<F>(&self, callback: F) -> ChannelResult<()>
    where
        F: Fn(ChannelMessage) + Send + Sync + 'static,
    {
        let mut offset: i64 = 0;
        self.running.store(true, Ordering::SeqCst);

        tracing::info!("Telegram channel listening for messages...");

        while self.running.load(Ordering::SeqCst) {
            let updates = match self.poll_updates(offset).await {
                Ok(updates) => updates,
                Err(e) => {
                    tracing::warn!("Telegram poll error: {e}");
                    tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                    continue;
                }
            };

            for update in &updates {
                if let Some(uid) = update.get("update_id").and_then(Value::as_i64) {
                    offset = uid + 1;
                }

                if let Some(msg) = self.to_channel_message(update) {
                    callback(msg);
                }
            }
        }

        Ok(())
    }

    async fn health_check(&self) -> ChannelResult<()> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::Connection(self.redact(&e.to_string())))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::NotReady)
        }
    }

    async fn shutdown(&self) -> ChannelResult<()> {
        tracing::info!("Telegram channel shutting down");
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }
}
