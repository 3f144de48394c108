use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::MAX_POLL_TIMEOUT;
use crate::platform::UpdatesQuery;
use crate::relay::filter::{filter_updates, NormalizedMessage};
use crate::relay::Relay;

/// Outcome of one poll cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status")]
pub enum PollResult {
    /// At least one message from the target chat arrived.
    #[serde(rename = "received")]
    Received { messages: Vec<NormalizedMessage> },

    /// The wait elapsed with nothing for the target chat. Other chats'
    /// updates may still have moved the cursor.
    #[serde(rename = "timeout")]
    TimedOut {
        #[serde(rename = "last_id")]
        cursor_after: i64,
    },

    /// Transport or API failure. The cursor was not touched.
    #[serde(rename = "error")]
    Failed {
        #[serde(rename = "message")]
        detail: String,
    },
}

impl Relay {
    /// Wait up to `wait_secs` (capped at 120) for new updates, return what
    /// arrived for the target chat and advance the cursor past the whole batch.
    ///
    /// Delivery is at-least-once: a failed fetch leaves the cursor alone so
    /// the same range is requested again next time.
    pub async fn poll_once(&self, wait_secs: u64) -> PollResult {
        let wait_secs = wait_secs.min(MAX_POLL_TIMEOUT);
        let _gate = self.poll_gate.lock().await;

        let stored = self.cursor.load().await;
        let (cursor, offset) = match stored.checked_add(1) {
            Some(offset) => (stored, offset),
            None => {
                error!("Stored cursor {} has no successor. Starting from 0", stored);
                (0, 1)
            }
        };
        let query = UpdatesQuery {
            offset: Some(offset),
            timeout: wait_secs,
            limit: None,
        };

        let updates = match self.api.get_updates(query).await {
            Ok(updates) => updates,
            Err(e) => {
                warn!("Poll failed at offset {}: {}", offset, e);
                return PollResult::Failed {
                    detail: e.to_string(),
                };
            }
        };

        let batch = filter_updates(&updates, self.chat_id);
        let cursor_after = batch
            .max_update_id
            .map_or(cursor, |seen| seen.max(cursor));

        // Also rewrites a stored cursor that had to be reset.
        if cursor_after != stored {
            self.cursor.save(cursor_after).await;
        }

        debug!(
            "Poll fetched {} updates, {} for chat {}, cursor {} -> {}",
            updates.len(),
            batch.messages.len(),
            self.chat_id,
            cursor,
            cursor_after
        );

        if batch.messages.is_empty() {
            PollResult::TimedOut { cursor_after }
        } else {
            info!("Received {} message(s)", batch.messages.len());
            PollResult::Received {
                messages: batch.messages,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::testing::{
        bare_update, harness, remote_error, update, OTHER_CHAT, TARGET_CHAT,
    };
    use crate::state::CursorStore;

    #[tokio::test]
    async fn test_receives_target_message_and_advances_past_batch() {
        let h = harness(Some(5));
        h.api
            .push_batch(vec![update(6, TARGET_CHAT, "hi"), update(7, OTHER_CHAT, "x")])
            .await;

        let result = h.relay.poll_once(30).await;

        match result {
            PollResult::Received { messages } => {
                assert_eq!(messages.len(), 1);
                assert_eq!(messages[0].text, "hi");
                assert_eq!(messages[0].from, "operator");
            }
            other => panic!("expected received, got {other:?}"),
        }
        assert_eq!(h.store.stored().await, Some(7));
        assert_eq!(h.api.queries.lock().await[0].offset, Some(6));
    }

    #[tokio::test]
    async fn test_unwritten_store_starts_at_offset_one() {
        let h = harness(None);
        let result = h.relay.poll_once(0).await;

        assert_eq!(result, PollResult::TimedOut { cursor_after: 0 });
        assert_eq!(h.api.queries.lock().await[0].offset, Some(1));
        assert_eq!(h.store.stored().await, None);
    }

    #[tokio::test]
    async fn test_irrelevant_updates_advance_cursor_and_are_not_refetched() {
        let h = harness(Some(10));
        h.api
            .push_batch(vec![
                update(11, OTHER_CHAT, "a"),
                bare_update(12),
                update(14, OTHER_CHAT, "b"),
            ])
            .await;

        let first = h.relay.poll_once(5).await;
        assert_eq!(first, PollResult::TimedOut { cursor_after: 14 });
        assert_eq!(h.store.stored().await, Some(14));

        h.relay.poll_once(5).await;
        let queries = h.api.queries.lock().await;
        assert_eq!(queries[1].offset, Some(15));
    }

    #[tokio::test]
    async fn test_failure_leaves_cursor_untouched() {
        let h = harness(Some(20));
        h.api.push_error(remote_error(502, "Bad Gateway")).await;

        let result = h.relay.poll_once(5).await;
        match result {
            PollResult::Failed { detail } => assert!(detail.contains("Bad Gateway")),
            other => panic!("expected failure, got {other:?}"),
        }
        assert_eq!(h.store.stored().await, Some(20));

        // The retry asks for the same range.
        h.relay.poll_once(5).await;
        let queries = h.api.queries.lock().await;
        assert_eq!(queries[0].offset, Some(21));
        assert_eq!(queries[1].offset, Some(21));
    }

    #[tokio::test]
    async fn test_cursor_never_regresses() {
        let h = harness(Some(50));
        // A stale batch below the stored cursor must not pull it back.
        h.api.push_batch(vec![update(40, TARGET_CHAT, "old")]).await;
        h.api.push_batch(vec![update(51, TARGET_CHAT, "new")]).await;

        let mut seen = vec![h.store.load().await];
        h.relay.poll_once(1).await;
        seen.push(h.store.load().await);
        h.relay.poll_once(1).await;
        seen.push(h.store.load().await);

        assert_eq!(seen, vec![50, 50, 51]);
    }

    #[tokio::test]
    async fn test_cursor_at_max_restarts_from_zero() {
        let h = harness(Some(i64::MAX));
        h.api.push_batch(vec![update(3, TARGET_CHAT, "after reset")]).await;

        let result = h.relay.poll_once(0).await;

        assert!(matches!(result, PollResult::Received { .. }));
        assert_eq!(h.api.queries.lock().await[0].offset, Some(1));
        assert_eq!(h.store.stored().await, Some(3));
    }

    #[tokio::test]
    async fn test_cursor_at_max_with_empty_batch() {
        let h = harness(Some(i64::MAX));
        let result = h.relay.poll_once(0).await;
        assert_eq!(result, PollResult::TimedOut { cursor_after: 0 });
        assert_eq!(h.api.queries.lock().await[0].offset, Some(1));
        assert_eq!(h.store.stored().await, Some(0));
    }

    #[tokio::test]
    async fn test_timeout_is_clamped() {
        let h = harness(Some(0));
        h.relay.poll_once(500).await;
        h.relay.poll_once(0).await;

        let queries = h.api.queries.lock().await;
        assert_eq!(queries[0].timeout, MAX_POLL_TIMEOUT);
        assert_eq!(queries[1].timeout, 0);
    }

    #[test]
    fn test_wire_shape() {
        let timeout = serde_json::to_value(PollResult::TimedOut { cursor_after: 7 }).unwrap();
        assert_eq!(timeout, serde_json::json!({"status": "timeout", "last_id": 7}));

        let failed = serde_json::to_value(PollResult::Failed {
            detail: "boom".to_string(),
        })
        .unwrap();
        assert_eq!(failed, serde_json::json!({"status": "error", "message": "boom"}));
    }
}
