pub mod filter;
pub mod history;
pub mod interact;
pub mod poll;

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::platform::BotApi;
use crate::state::CursorStore;

/// Tunables the relay reads on every call.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub reply_wait_secs: u64,
    pub history_window: u32,
}

impl RelaySettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            reply_wait_secs: config.relay.reply_wait_secs,
            history_window: config.relay.history_window,
        }
    }
}

/// Configuration and cursor snapshot returned by `who_am_i`.
#[derive(Debug, Clone, Serialize)]
pub struct RelayStatus {
    pub version: &'static str,
    pub chat_id: i64,
    pub token_len: usize,
    pub state_file: String,
    pub state: crate::state::CursorState,
}

/// Relays messages between the caller and one Telegram chat.
///
/// Poll cycles (including the reply wait in `interact`) are serialized through
/// `poll_gate`; sends are not.
pub struct Relay {
    api: Arc<dyn BotApi>,
    cursor: Arc<dyn CursorStore>,
    chat_id: i64,
    settings: RelaySettings,
    poll_gate: Mutex<()>,
}

impl Relay {
    pub fn new(
        api: Arc<dyn BotApi>,
        cursor: Arc<dyn CursorStore>,
        chat_id: i64,
        settings: RelaySettings,
    ) -> Self {
        Self {
            api,
            cursor,
            chat_id,
            settings,
            poll_gate: Mutex::new(()),
        }
    }

    /// Snapshot for `who_am_i`. Reads the cursor but never writes it.
    pub async fn status(&self, config: &Config) -> RelayStatus {
        RelayStatus {
            version: env!("CARGO_PKG_VERSION"),
            chat_id: self.chat_id,
            token_len: config.telegram.bot_token.len(),
            state_file: config.state.path.display().to_string(),
            state: crate::state::CursorState {
                last_update_id: self.cursor.load().await,
            },
        }
    }
}
