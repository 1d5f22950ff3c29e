//! Relay Channels - Telegram front end for the vLLM relay.
//!
//! This crate provides:
//! - The `Channel` trait and the Telegram Bot API adapter
//! - Per-user conversation history
//! - Reply splitting for the platform message limit
//! - The bridge that runs one model exchange per inbound message
//!
//! ## Architecture
//!
//! ```text
//! User → getUpdates → TelegramChannel → mpsc → InferenceBridge → vLLM
//!                                                   ↓
//! User ←── sendMessage ←── split_message ←──── reply + history
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod bridge;
pub mod history;
pub mod message;
pub mod split;
pub mod telegram;
pub mod traits;

// Re-export commonly used types
pub use bridge::{BridgeSettings, ExchangeOutcome, InferenceBridge};
pub use history::HistoryStore;
pub use message::{ChannelMessage, ChannelType, MessageContent};
pub use split::split_message;
pub use telegram::TelegramChannel;
pub use traits::{Channel, ChannelError, ChannelResult};

use relay_agent::{CompatibleProvider, Provider};
use relay_common::config::Config;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Inbound messages buffered between the poller and the dispatcher.
///
/// The poller never waits on the dispatcher. When the queue is full the
/// message is dropped, and the Telegram offset has already moved past it,
/// so it is not redelivered.
const INBOUND_QUEUE_SIZE: usize = 100;

/// Hand an inbound message to the dispatcher without blocking the poller.
///
/// Returns `false` if the message was dropped.
fn enqueue(tx: &mpsc::Sender<ChannelMessage>, msg: ChannelMessage) -> bool {
    match tx.try_send(msg) {
        Ok(()) => true,
        Err(e) => {
            let reason = match &e {
                mpsc::error::TrySendError::Full(_) => "queue full",
                mpsc::error::TrySendError::Closed(_) => "dispatcher stopped",
            };
            let msg = e.into_inner();
            tracing::error!(
                trace_id = %msg.trace_id,
                user_id = %msg.user_id,
                chat_id = %msg.channel_id,
                reason,
                "Dropping inbound message"
            );
            false
        }
    }
}

/// Run the relay until Ctrl-C. The config must already be validated.
pub async fn run(config: &Config) -> anyhow::Result<()> {
    let provider = Arc::new(CompatibleProvider::from_config(&config.inference));
    tracing::info!(
        endpoint = %provider.base_url(),
        model = %config.inference.model,
        "Using inference endpoint"
    );

    // The endpoint may still be loading the model; keep going either way.
    if let Err(e) = provider.warmup(&config.inference.model).await {
        tracing::warn!(error = %e, "Inference endpoint warmup failed");
    }

    let bot_token = config
        .telegram_bot_token()
        .ok_or_else(|| anyhow::anyhow!("TELEGRAM_BOT_TOKEN is not set"))?;
    let mut telegram = TelegramChannel::new(
        bot_token.to_string(),
        config.telegram.allowed_users.clone(),
    )
    .with_poll_timeout(config.telegram.poll_timeout_secs);
    telegram.init().await?;
    let telegram = Arc::new(telegram);

    let bridge = Arc::new(InferenceBridge::from_config(
        provider,
        telegram.clone(),
        config,
    ));

    let (tx, rx) = mpsc::channel(INBOUND_QUEUE_SIZE);
    let processor_handle = InferenceBridge::spawn_processor(bridge, rx);

    let listener = telegram.clone();
    let listen_handle = tokio::spawn(async move {
        let result = listener
            .listen(move |msg| {
                enqueue(&tx, msg);
            })
            .await;
        if let Err(e) = result {
            tracing::error!(error = %e, "Telegram listener stopped");
        }
    });

    tracing::info!("Relay running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutdown signal received");
    telegram.shutdown().await?;
    listen_handle.abort();
    processor_handle.abort();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inbound(user: &str) -> ChannelMessage {
        ChannelMessage {
            id: "1".into(),
            channel_type: ChannelType::Telegram,
            channel_id: "42".into(),
            user_id: user.into(),
            username: None,
            content: MessageContent::from_text("hi"),
            timestamp: 0,
            trace_id: "trace".into(),
            span_id: "span".into(),
        }
    }

    #[test]
    fn test_enqueue_drops_when_full() {
        let (tx, mut rx) = mpsc::channel(1);
        assert!(enqueue(&tx, inbound("alice")));
        assert!(!enqueue(&tx, inbound("bob")));

        assert_eq!(rx.try_recv().map(|m| m.user_id).ok().as_deref(), Some("alice"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_enqueue_after_dispatcher_stopped() {
        let (tx, rx) = mpsc::channel(INBOUND_QUEUE_SIZE);
        drop(rx);
        assert!(!enqueue(&tx, inbound("alice")));
    }
}
