use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::platform::types::Update;

/// Sender shown when a message carries no username.
pub const UNKNOWN_SENDER: &str = "unknown";

/// A message from the target chat, reduced to what the caller reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedMessage {
    pub text: String,
    pub from: String,
    #[serde(with = "chrono::serde::ts_seconds_option")]
    pub date: Option<DateTime<Utc>>,
}

/// Result of narrowing one raw batch to the target chat.
#[derive(Debug, Default, PartialEq)]
pub struct FilteredBatch {
    /// Target-chat messages, in the order the API returned them.
    pub messages: Vec<NormalizedMessage>,
    /// Highest update id in the whole batch, including dropped updates.
    pub max_update_id: Option<i64>,
}

/// Keep messages whose chat is `chat_id`.
///
/// `max_update_id` covers every update so the cursor can move past traffic
/// from other chats and never fetch it again.
pub fn filter_updates(updates: &[Update], chat_id: i64) -> FilteredBatch {
    let max_update_id = updates.iter().map(|u| u.update_id).max();

    let messages = updates
        .iter()
        .filter_map(|u| u.message.as_ref())
        .filter(|m| m.chat.id == chat_id)
        .map(|m| NormalizedMessage {
            text: m.text.clone().unwrap_or_default(),
            from: m
                .from
                .as_ref()
                .and_then(|u| u.username.clone())
                .unwrap_or_else(|| UNKNOWN_SENDER.to_string()),
            date: m.date,
        })
        .collect();

    FilteredBatch {
        messages,
        max_update_id,
    }
}
