use std::sync::Arc;

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use crate::config::{Config, MAX_POLL_TIMEOUT};
use crate::relay::interact::format_heading;
use crate::relay::Relay;

const INSTRUCTIONS: &str = "\
Use this to communicate with the user via Telegram.
1. 'interact' sends a message and can optionally wait for a reply.
2. 'poll_messages' is the primary way to wait for new messages; call it in a loop.
3. 'get_messages' fetches recent history without consuming anything.";

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct PollArgs {
    /// Seconds to wait for new messages (0-120). Out-of-range values are clamped.
    #[serde(default)]
    pub timeout: Option<i64>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct InteractArgs {
    /// Project name shown in the message heading.
    pub project_name: String,
    /// Session name shown in the message heading.
    pub session_name: String,
    /// Message body.
    #[serde(default)]
    pub message: Option<String>,
    /// Wait for the user's reply after sending.
    #[serde(default)]
    pub wait_for_reply: bool,
    /// Reply options shown as a one-time keyboard.
    #[serde(default)]
    pub choices: Option<Vec<String>>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct HistoryArgs {
    /// Maximum number of messages to return (default 10).
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Stdio tool server exposing the relay.
#[derive(Clone)]
pub struct RelayServer {
    relay: Arc<Relay>,
    config: Arc<Config>,
    tool_router: ToolRouter<Self>,
}

fn json_result(value: Value) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::success(vec![Content::text(value.to_string())]))
}

#[tool_router]
impl RelayServer {
    pub fn new(relay: Arc<Relay>, config: Arc<Config>) -> Self {
        Self {
            relay,
            config,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Return the relay's configuration status and persisted cursor.")]
    async fn who_am_i(&self) -> Result<CallToolResult, McpError> {
        let status = self.relay.status(&self.config).await;
        let value = serde_json::to_value(status)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        json_result(value)
    }

    #[tool(
        description = "Wait for new messages for up to `timeout` seconds (max 120). Use this in a loop to keep listening."
    )]
    async fn poll_messages(
        &self,
        Parameters(args): Parameters<PollArgs>,
    ) -> Result<CallToolResult, McpError> {
        let timeout = match args.timeout {
            Some(t) => t.clamp(0, MAX_POLL_TIMEOUT as i64) as u64,
            None => self.config.relay.default_poll_timeout,
        };
        info!("poll_messages timeout={}", timeout);

        let result = self.relay.poll_once(timeout).await;
        let value = serde_json::to_value(result)
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        json_result(value)
    }

    #[tool(description = "Send a message and optionally wait for a reply.")]
    async fn interact(
        &self,
        Parameters(args): Parameters<InteractArgs>,
    ) -> Result<CallToolResult, McpError> {
        let heading = format_heading(&args.project_name, &args.session_name);
        let choices = args.choices.unwrap_or_default();
        info!(
            "interact {} wait_for_reply={} choices={}",
            heading,
            args.wait_for_reply,
            choices.len()
        );

        let result = self
            .relay
            .interact(
                &heading,
                args.message.as_deref(),
                args.wait_for_reply,
                &choices,
            )
            .await;
        json_result(result.to_json())
    }

    #[tool(description = "Get recent messages from the chat, newest first.")]
    async fn get_messages(
        &self,
        Parameters(args): Parameters<HistoryArgs>,
    ) -> Result<CallToolResult, McpError> {
        let limit = args.limit.unwrap_or(10);
        match self.relay.recent(limit).await {
            Ok(messages) => json_result(json!({ "messages": messages })),
            Err(e) => json_result(json!({
                "status": "error",
                "message": format!("API error: {}", e),
            })),
        }
    }
}

#[tool_handler]
impl ServerHandler for RelayServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::testing::{harness, update, Harness, TARGET_CHAT};

    fn server() -> (RelayServer, Harness) {
        let h = harness(Some(5));
        // Share the scripted API and store with a second relay the server owns.
        let relay = Relay::new(
            h.api.clone(),
            h.store.clone(),
            TARGET_CHAT,
            crate::relay::RelaySettings {
                reply_wait_secs: 60,
                history_window: 100,
            },
        );
        let mut config = Config::default();
        config.telegram.bot_token = "token".to_string();
        config.telegram.chat_id = Some(TARGET_CHAT);
        (RelayServer::new(Arc::new(relay), Arc::new(config)), h)
    }

    fn body(result: CallToolResult) -> Value {
        let text = result
            .content
            .iter()
            .find_map(|c| c.raw.as_text().map(|t| t.text.clone()))
            .unwrap();
        serde_json::from_str(&text).unwrap()
    }

    #[tokio::test]
    async fn test_who_am_i() {
        let (server, _h) = server();
        let value = body(server.who_am_i().await.unwrap());
        assert_eq!(value["chat_id"], TARGET_CHAT);
        assert_eq!(value["token_len"], 5);
        assert_eq!(value["state"]["last_update_id"], 5);
    }

    #[tokio::test]
    async fn test_poll_messages_end_to_end() {
        let (server, h) = server();
        h.api
            .push_batch(vec![update(6, TARGET_CHAT, "hi"), update(7, 999, "x")])
            .await;

        let value = body(
            server
                .poll_messages(Parameters(PollArgs { timeout: Some(0) }))
                .await
                .unwrap(),
        );
        assert_eq!(value["status"], "received");
        assert_eq!(value["messages"][0]["text"], "hi");
        assert_eq!(h.store.stored().await, Some(7));
    }

    #[tokio::test]
    async fn test_poll_messages_clamps_out_of_range_timeout() {
        let (server, h) = server();
        for timeout in [-5, i64::MIN, 121, i64::MAX] {
            let value = body(
                server
                    .poll_messages(Parameters(PollArgs {
                        timeout: Some(timeout),
                    }))
                    .await
                    .unwrap(),
            );
            assert_eq!(value["status"], "timeout");
        }

        let queries = h.api.queries.lock().await;
        let timeouts: Vec<_> = queries.iter().map(|q| q.timeout).collect();
        assert_eq!(timeouts, vec![0, 0, MAX_POLL_TIMEOUT, MAX_POLL_TIMEOUT]);
    }

    #[test]
    fn test_poll_args_accept_negative_timeout() {
        let args: PollArgs = serde_json::from_value(json!({"timeout": -3})).unwrap();
        assert_eq!(args.timeout, Some(-3));
    }

    #[tokio::test]
    async fn test_poll_messages_uses_default_timeout() {
        let (server, h) = server();
        server
            .poll_messages(Parameters(PollArgs { timeout: None }))
            .await
            .unwrap();
        assert_eq!(h.api.queries.lock().await[0].timeout, 100);
    }

    #[tokio::test]
    async fn test_interact_builds_heading() {
        let (server, h) = server();
        let value = body(
            server
                .interact(Parameters(InteractArgs {
                    project_name: "proj".to_string(),
                    session_name: "main".to_string(),
                    message: Some("done".to_string()),
                    wait_for_reply: false,
                    choices: None,
                }))
                .await
                .unwrap(),
        );
        assert_eq!(value["status"], "sent");
        assert_eq!(h.api.sent.lock().await[0].text, "[proj | main]\ndone");
    }

    #[tokio::test]
    async fn test_get_messages_default_limit() {
        let (server, h) = server();
        let batch = (1..=12).map(|i| update(i, TARGET_CHAT, "m")).collect();
        h.api.push_batch(batch).await;

        let value = body(
            server
                .get_messages(Parameters(HistoryArgs { limit: None }))
                .await
                .unwrap(),
        );
        assert_eq!(value["messages"].as_array().unwrap().len(), 10);
        assert_eq!(h.store.stored().await, Some(5));
    }

    #[test]
    fn test_interact_args_defaults() {
        let args: InteractArgs =
            serde_json::from_value(json!({"project_name": "p", "session_name": "s"})).unwrap();
        assert!(!args.wait_for_reply);
        assert!(args.message.is_none());
        assert!(args.choices.is_none());
    }
}
