//! Channel trait for the messaging side of the relay.

use crate::message::ChannelMessage;
use async_trait::async_trait;

/// Result type for channel operations.
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Channel error type.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Message send failed: {0}")]
    SendFailed(String),

    #[error("Channel not ready")]
    NotReady,
}

/// Channel adapter trait.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Get the channel name.
    fn name(&self) -> &'static str;

    /// Initialize the channel (verify credentials).
    async fn init(&mut self) -> ChannelResult<()>;

    /// Send one plain-text message to a chat.
    ///
    /// Callers split long text beforehand; one call is one platform message.
    async fn send_text(&self, chat_id: &str, text: &str) -> ChannelResult<()>;

    /// Listen for incoming messages, calling `callback` for each one.
    ///
    /// Runs until the channel is shut down.
    async fn listen<F>(&self, callback: F) -> ChannelResult<()>
    where
        F: Fn(ChannelMessage) + Send + Sync + 'static;

    /// Check if the channel is healthy.
    async fn health_check(&self) -> ChannelResult<()>;

    /// Shutdown the channel gracefully.
    async fn shutdown(&self) -> ChannelResult<()>;
}
