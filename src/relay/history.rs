use tracing::debug;

use crate::error::TransportError;
use crate::platform::UpdatesQuery;
use crate::relay::filter::{filter_updates, NormalizedMessage};
use crate::relay::Relay;

impl Relay {
    /// Up to `limit` of the most recent target-chat messages still held by
    /// the API, newest first.
    ///
    /// Read-only: the cursor is neither read nor written, so messages already
    /// returned by a poll can show up again here.
    pub async fn recent(&self, limit: usize) -> Result<Vec<NormalizedMessage>, TransportError> {
        let updates = self
            .api
            .get_updates(UpdatesQuery {
                offset: None,
                timeout: 0,
                limit: Some(self.settings.history_window),
            })
            .await?;

        let mut messages = filter_updates(&updates, self.chat_id).messages;
        messages.reverse();
        messages.truncate(limit);

        debug!(
            "History lookup: {} updates, returning {} message(s)",
            updates.len(),
            messages.len()
        );
        Ok(messages)
    }
}
