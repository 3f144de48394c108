use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::TransportError;
use crate::platform::telegram::build_reply_keyboard;
use crate::platform::types::SendMessage;
use crate::relay::poll::PollResult;
use crate::relay::Relay;

/// Outcome of `Relay::interact`.
#[derive(Debug, Clone, PartialEq)]
pub enum InteractionResult {
    /// Sent, no reply requested. Carries the raw API response.
    Sent { response: Value },
    /// The send itself failed; no reply wait happened.
    Failed { detail: String },
    /// Sent, then one poll cycle ran for the reply.
    Replied(PollResult),
}

impl InteractionResult {
    pub fn to_json(&self) -> Value {
        match self {
            InteractionResult::Sent { response } => json!({
                "status": "sent",
                "response": response,
            }),
            InteractionResult::Failed { detail } => json!({
                "status": "error",
                "message": detail,
            }),
            InteractionResult::Replied(poll) => {
                serde_json::to_value(poll).unwrap_or_else(|e| {
                    json!({"status": "error", "message": e.to_string()})
                })
            }
        }
    }
}

/// Heading that tags every outbound message with where it came from.
pub fn format_heading(project: &str, session: &str) -> String {
    format!("[{} | {}]", project, session)
}

impl Relay {
    /// Send `text` to the target chat, with a one-shot reply keyboard when
    /// `choices` is non-empty.
    pub async fn send(&self, text: String, choices: &[String]) -> Result<Value, TransportError> {
        let message = SendMessage {
            chat_id: self.chat_id,
            text,
            reply_markup: build_reply_keyboard(choices),
        };
        self.api.send_message(&message).await
    }

    /// Send `heading` + `body` and, if asked, wait one poll cycle for the reply.
    ///
    /// The reply wait is an ordinary poll: whatever arrives for the chat after
    /// the cursor is returned, with no correlation to the sent message.
    pub async fn interact(
        &self,
        heading: &str,
        body: Option<&str>,
        wait_for_reply: bool,
        choices: &[String],
    ) -> InteractionResult {
        let text = format!("{}\n{}", heading, body.unwrap_or_default());

        let response = match self.send(text, choices).await {
            Ok(response) => response,
            Err(e) => {
                warn!("Send failed: {}", e);
                return InteractionResult::Failed {
                    detail: format!("Send API error: {}", e),
                };
            }
        };

        if !wait_for_reply {
            return InteractionResult::Sent { response };
        }

        info!(
            "Message sent, waiting up to {}s for a reply",
            self.settings.reply_wait_secs
        );
        InteractionResult::Replied(self.poll_once(self.settings.reply_wait_secs).await)
    }
}
