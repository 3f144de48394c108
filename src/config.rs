use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Upper bound on the server-side long-poll wait, in seconds.
pub const MAX_POLL_TIMEOUT: u64 = 120;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub chat_id: Option<i64>,
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StateConfig {
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RelayConfig {
    /// How long `interact` waits for a reply when asked to.
    #[serde(default = "default_reply_wait_secs")]
    pub reply_wait_secs: u64,
    /// How many updates `get_messages` asks the API for.
    #[serde(default = "default_history_window")]
    pub history_window: u32,
    #[serde(default = "default_poll_timeout")]
    pub default_poll_timeout: u64,
    #[serde(default = "default_send_timeout_secs")]
    pub send_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: None,
            api_base_url: default_api_base_url(),
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            reply_wait_secs: default_reply_wait_secs(),
            history_window: default_history_window(),
            default_poll_timeout: default_poll_timeout(),
            send_timeout_secs: default_send_timeout_secs(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_state_path() -> PathBuf {
    PathBuf::from("tg_state.json")
}

fn default_reply_wait_secs() -> u64 {
    60
}

fn default_history_window() -> u32 {
    100
}

fn default_poll_timeout() -> u64 {
    100
}

fn default_send_timeout_secs() -> u64 {
    120
}

impl Config {
    /// Read `path` if it exists, then apply `TELEGRAM_*` environment overrides.
    /// The result is validated, so a returned config always has credentials.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            Self::from_toml_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Config::default()
        };

        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid TOML")
    }

    /// Override credentials from the environment. `lookup` is injected so
    /// tests don't have to touch process-global state.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("TELEGRAM_BOT_TOKEN").filter(|t| !t.trim().is_empty()) {
            self.telegram.bot_token = token.trim().to_string();
        }
        if let Some(raw) = lookup("TELEGRAM_CHAT_ID").filter(|c| !c.trim().is_empty()) {
            let chat_id = raw
                .trim()
                .parse::<i64>()
                .map_err(|_| ConfigError::InvalidChatId(raw.clone()))?;
            self.telegram.chat_id = Some(chat_id);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram.bot_token.is_empty() {
            return Err(ConfigError::MissingToken);
        }
        if self.telegram.chat_id.is_none() {
            return Err(ConfigError::MissingChatId);
        }
        Ok(())
    }

    /// Target chat id. Only meaningful after `validate` has passed.
    pub fn chat_id(&self) -> i64 {
        self.telegram.chat_id.unwrap_or_default()
    }
}
