//! Message types for channel communication.

use serde::{Deserialize, Serialize};

/// Channel type enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    Telegram,
}

impl ChannelType {
    /// Get the channel type as a string.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Telegram => "telegram",
        }
    }
}

/// Inbound message in channel-neutral form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// Message ID (generated on receipt)
    pub id: String,
    /// Channel type
    pub channel_type: ChannelType,
    /// Where replies go (Telegram chat id)
    pub channel_id: String,
    /// Stable user identity, keys the conversation history
    pub user_id: String,
    /// Platform username, if the user has one
    #[serde(default)]
    pub username: Option<String>,
    /// Message content
    pub content: MessageContent,
    /// Timestamp (Unix millis)
    pub timestamp: i64,
    /// Trace ID, one per inbound message
    pub trace_id: String,
    /// Span ID for this hop
    pub span_id: String,
}

/// Message content types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessageContent {
    /// Plain text, forwarded to the model
    Text { text: String },
    /// Bot command such as `/start` (name stored without the slash)
    Command { name: String, args: String },
}

impl MessageContent {
    /// Classify raw message text as a command or plain text.
    pub fn from_text(text: &str) -> Self {
        match parse_command(text) {
            Some((name, args)) => Self::Command { name, args },
            None => Self::Text {
                text: text.to_string(),
            },
        }
    }
}

/// Parse `/name[@bot] args...` into a lowercase command name and its arguments.
///
/// Returns `None` for anything that is not a command, including a bare `/`.
pub fn parse_command(text: &str) -> Option<(String, String)> {
    let rest = text.trim_start().strip_prefix('/')?;
    let (head, args) = match rest.find(char::is_whitespace) {
        Some(idx) => (&rest[..idx], rest[idx..].trim()),
        None => (rest, ""),
    };

    // Group chats address commands as /cmd@botname.
    let name = head.split('@').next().unwrap_or_default();
    if name.is_empty() {
        return None;
    }

    Some((name.to_lowercase(), args.to_string()))
}
