pub mod telegram;
pub mod types;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::TransportError;
use crate::platform::types::{SendMessage, Update};

/// Parameters for one `getUpdates` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdatesQuery {
    /// First update id to return. `None` lets the API pick its backlog start.
    pub offset: Option<i64>,
    /// Server-side long-poll wait in seconds.
    pub timeout: u64,
    pub limit: Option<u32>,
}

/// The two Bot API calls the relay needs. `TelegramApi` is the real one.
#[async_trait]
pub trait BotApi: Send + Sync {
    /// Fetch a batch of message updates. An elapsed wait is an empty batch.
    async fn get_updates(&self, query: UpdatesQuery) -> Result<Vec<Update>, TransportError>;

    /// Send a message and return the raw API response.
    async fn send_message(&self, message: &SendMessage) -> Result<Value, TransportError>;
}
