use thiserror::Error;

/// Missing or malformed credentials. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("bot token is not set (telegram.bot_token or TELEGRAM_BOT_TOKEN)")]
    MissingToken,

    #[error("chat id is not set (telegram.chat_id or TELEGRAM_CHAT_ID)")]
    MissingChatId,

    #[error("chat id is not an integer: {0:?}")]
    InvalidChatId(String),
}

/// Failure talking to the Telegram Bot API.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The API answered, but not with success. `body` is the raw response text.
    #[error("Telegram API error ({status}): {body}")]
    Remote { status: u16, body: String },

    /// DNS, connect, reset or client-side timeout.
    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("malformed Telegram response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Unreadable or unwritable cursor file. Logged, never returned to callers.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("state file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("state file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}
