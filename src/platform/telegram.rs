use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::platform::types::{
    ApiResponse, KeyboardButton, ReplyKeyboardMarkup, SendMessage, Update,
};
use crate::platform::{BotApi, UpdatesQuery};

/// Extra client-side time on top of the server-side long-poll wait, so the
/// HTTP timeout never cuts the API's own wait short.
const POLL_HEADROOM_SECS: u64 = 10;

/// Raw HTTP client for the Telegram Bot API.
pub struct TelegramApi {
    client: Client,
    base_url: String,
    send_timeout: Duration,
}

impl TelegramApi {
    pub fn new(bot_token: &str, api_base_url: &str, send_timeout_secs: u64) -> Self {
        Self {
            client: Client::new(),
            base_url: format!("{}/bot{}", api_base_url.trim_end_matches('/'), bot_token),
            send_timeout: Duration::from_secs(send_timeout_secs),
        }
    }
}

/// Turn an HTTP response into the API's `result`, keeping the raw body for
/// anything that isn't a success.
async fn read_result<T: DeserializeOwned>(
    method: &str,
    response: reqwest::Response,
) -> Result<T, TransportError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        warn!("{} failed ({}): {}", method, status, body);
        return Err(TransportError::Remote {
            status: status.as_u16(),
            body,
        });
    }

    let parsed: ApiResponse<T> = serde_json::from_str(&body)?;
    match parsed.result {
        Some(result) if parsed.ok => Ok(result),
        _ => {
            warn!(
                "{} returned ok=false: {}",
                method,
                parsed.description.as_deref().unwrap_or("")
            );
            Err(TransportError::Remote {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[async_trait]
impl BotApi for TelegramApi {
    async fn get_updates(&self, query: UpdatesQuery) -> Result<Vec<Update>, TransportError> {
        let mut params: Vec<(&str, String)> = vec![
            ("timeout", query.timeout.to_string()),
            ("allowed_updates", r#"["message"]"#.to_string()),
        ];
        if let Some(offset) = query.offset {
            params.push(("offset", offset.to_string()));
        }
        if let Some(limit) = query.limit {
            params.push(("limit", limit.to_string()));
        }

        debug!(
            "getUpdates offset={:?} timeout={} limit={:?}",
            query.offset, query.timeout, query.limit
        );

        let response = self
            .client
            .get(format!("{}/getUpdates", self.base_url))
            .query(&params)
            .timeout(Duration::from_secs(query.timeout + POLL_HEADROOM_SECS))
            .send()
            .await?;

        read_result("getUpdates", response).await
    }

    async fn send_message(&self, message: &SendMessage) -> Result<Value, TransportError> {
        debug!("sendMessage to chat_id={}", message.chat_id);

        let response = self
            .client
            .post(format!("{}/sendMessage", self.base_url))
            .json(message)
            .timeout(self.send_timeout)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!("sendMessage failed ({}): {}", status, body);
            return Err(TransportError::Remote {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

/// One choice per row, hidden again after the first tap.
pub fn build_reply_keyboard(choices: &[String]) -> Option<ReplyKeyboardMarkup> {
    if choices.is_empty() {
        return None;
    }

    let keyboard = choices
        .iter()
        .map(|choice| {
            vec![KeyboardButton {
                text: choice.clone(),
            }]
        })
        .collect();

    Some(ReplyKeyboardMarkup {
        keyboard,
        one_time_keyboard: true,
    })
}
