//! Per-user conversation history.
//!
//! Histories live in process memory only and are keyed by the channel's user
//! id. Each entry is updated atomically, and users never share an entry.

use dashmap::DashMap;
use relay_agent::ChatMessage;

/// Bounded, per-user log of prior user/assistant turns.
#[derive(Debug)]
pub struct HistoryStore {
    histories: DashMap<String, Vec<ChatMessage>>,
    max_turns: usize,
}

impl HistoryStore {
    /// Create a store keeping at most `max_turns` turns per user.
    pub fn new(max_turns: usize) -> Self {
        Self {
            histories: DashMap::new(),
            max_turns,
        }
    }

    /// Configured history depth.
    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Snapshot of a user's history, oldest turn first. Empty for unknown users.
    pub fn get(&self, user_id: &str) -> Vec<ChatMessage> {
        self.histories
            .get(user_id)
            .map(|entry| entry.value().clone())
            .unwrap_or_default()
    }

    /// Forget a user's history. Safe to call for unknown users.
    pub fn reset(&self, user_id: &str) {
        if self.histories.remove(user_id).is_some() {
            tracing::debug!(user_id = %user_id, "History reset");
        }
    }

    /// Record one completed exchange and trim to the configured depth.
    pub fn append(&self, user_id: &str, user_turn: ChatMessage, assistant_turn: ChatMessage) {
        let mut entry = self.histories.entry(user_id.to_string()).or_default();
        let history = entry.value_mut();
        history.push(user_turn);
        history.push(assistant_turn);
        Self::trim(history, self.max_turns);
    }

    /// Drop the oldest turns until at most `max_turns` remain.
    ///
    /// Turns are removed in user/assistant pairs, so an odd `max_turns`
    /// keeps `max_turns - 1` turns and a history never starts with an
    /// assistant reply.
    pub fn trim(history: &mut Vec<ChatMessage>, max_turns: usize) {
        let cap = max_turns - max_turns % 2;
        if history.len() <= cap {
            return;
        }
        let excess = history.len() - cap;
        let drop = (excess + excess % 2).min(history.len());
        history.drain(..drop);
    }

    /// Number of turns currently stored for a user.
    pub fn len(&self, user_id: &str) -> usize {
        self.histories
            .get(user_id)
            .map_or(0, |entry| entry.value().len())
    }

    /// Number of users with a stored history.
    pub fn user_count(&self) -> usize {
        self.histories.len()
    }
}
