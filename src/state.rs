use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, error};

use crate::error::StateError;

/// On-disk shape of the cursor file.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorState {
    #[serde(default)]
    pub last_update_id: i64,
}

/// Durable last-seen update id.
///
/// Neither method fails: a cursor that can't be read loads as 0 and a cursor
/// that can't be written is dropped, both with an error logged. The worst
/// outcome is updates being delivered again after a restart.
///
/// There is no locking. At most one poller may use a store at a time.
#[async_trait]
pub trait CursorStore: Send + Sync {
    async fn load(&self) -> i64;
    async fn save(&self, cursor: i64);
}

/// JSON file store, `{"last_update_id": n}`.
pub struct FileCursorStore {
    path: PathBuf,
}

impl FileCursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn try_load(&self) -> Result<Option<CursorState>, StateError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    async fn try_save(&self, state: CursorState) -> Result<(), StateError> {
        let json = serde_json::to_string(&state)?;

        // Write beside the target and rename so a crash never leaves half a file.
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl CursorStore for FileCursorStore {
    async fn load(&self) -> i64 {
        match self.try_load().await {
            Ok(Some(state)) => state.last_update_id,
            Ok(None) => {
                debug!("No cursor file at {}, starting from 0", self.path.display());
                0
            }
            Err(e) => {
                error!(
                    "Error loading cursor from {}: {}. Starting from 0",
                    self.path.display(),
                    e
                );
                0
            }
        }
    }

    async fn save(&self, cursor: i64) {
        let state = CursorState {
            last_update_id: cursor,
        };
        if let Err(e) = self.try_save(state).await {
            error!("Error saving cursor to {}: {}", self.path.display(), e);
        }
    }
}

/// In-process store, used by tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryCursorStore {
    cursor: tokio::sync::Mutex<Option<i64>>,
}

#[cfg(test)]
impl MemoryCursorStore {
    pub fn with_cursor(cursor: i64) -> Self {
        Self {
            cursor: tokio::sync::Mutex::new(Some(cursor)),
        }
    }

    /// Raw stored value, `None` if nothing was ever saved.
    pub async fn stored(&self) -> Option<i64> {
        *self.cursor.lock().await
    }
}

#[cfg(test)]
#[async_trait]
impl CursorStore for MemoryCursorStore {
    async fn load(&self) -> i64 {
        self.cursor.lock().await.unwrap_or(0)
    }

    async fn save(&self, cursor: i64) {
        let mut guard = self.cursor.lock().await;
        if let Some(previous) = *guard {
            if cursor < previous {
                tracing::warn!("Cursor moving backwards: {} -> {}", previous, cursor);
            }
        }
        *guard = Some(cursor);
    }
}
