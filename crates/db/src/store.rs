//! Conversation snapshot storage with optimistic versioning. One row per
//! conversation; every save compares-and-swaps on the version column, so
//! two concurrent invocations of the same conversation cannot silently
//! overwrite each other.

use careline_core::{ConversationId, ConversationState};
use chrono::Utc;
use sqlx::Row;
use thiserror::Error;
use tracing::warn;

use crate::DbPool;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("could not encode conversation state: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("conversation `{0}` was modified by a concurrent invocation")]
    VersionConflict(ConversationId),
}

/// A loaded snapshot together with the version the caller must present on
/// the next save.
#[derive(Clone, Debug, PartialEq)]
pub struct VersionedState {
    pub state: ConversationState,
    pub version: i64,
}

#[derive(Clone)]
pub struct ConversationStore {
    pool: DbPool,
}

impl ConversationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Load a snapshot. A row whose JSON no longer decodes is treated as
    /// absent: persisted-state decoding never fails a conversation, it
    /// restarts one.
    pub async fn load(
        &self,
        id: &ConversationId,
    ) -> Result<Option<VersionedState>, StoreError> {
        let row = sqlx::query(
            "SELECT state, version FROM conversations WHERE conversation_id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let raw: String = row.get("state");
        let version: i64 = row.get("version");
        match serde_json::from_str::<ConversationState>(&raw) {
            Ok(state) => Ok(Some(VersionedState { state, version })),
            Err(err) => {
                warn!(
                    event_name = "store.state.undecodable",
                    conversation_id = %id,
                    error = %err,
                    "stored snapshot is unreadable, treating conversation as new"
                );
                Ok(None)
            }
        }
    }

    /// Persist a snapshot. `expected_version` is `None` for a conversation
    /// the caller believes is new, `Some(v)` for the version it loaded.
    /// Returns the version now stored. A mismatch on either path yields
    /// [`StoreError::VersionConflict`].
    pub async fn save(
        &self,
        id: &ConversationId,
        state: &ConversationState,
        expected_version: Option<i64>,
    ) -> Result<i64, StoreError> {
        let encoded = serde_json::to_string(state)?;
        let now = Utc::now().to_rfc3339();

        match expected_version {
            None => {
                let result = sqlx::query(
                    "INSERT INTO conversations (conversation_id, state, version, updated_at)
                     VALUES (?, ?, 1, ?)
                     ON CONFLICT (conversation_id) DO NOTHING",
                )
                .bind(id.as_str())
                .bind(&encoded)
                .bind(&now)
                .execute(&self.pool)
                .await?;

                if result.rows_affected() == 0 {
                    return Err(StoreError::VersionConflict(id.clone()));
                }
                Ok(1)
            }
            Some(version) => {
                let result = sqlx::query(
                    "UPDATE conversations
                     SET state = ?, version = version + 1, updated_at = ?
                     WHERE conversation_id = ? AND version = ?",
                )
                .bind(&encoded)
                .bind(&now)
                .bind(id.as_str())
                .bind(version)
                .execute(&self.pool)
                .await?;

                if result.rows_affected() == 0 {
                    return Err(StoreError::VersionConflict(id.clone()));
                }
                Ok(version + 1)
            }
        }
    }

    /// Delete a conversation. Deleting an absent conversation is a no-op.
    pub async fn reset(&self, id: &ConversationId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM conversations WHERE conversation_id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use careline_core::{ConversationId, ConversationState, Message, Phase};

    use super::{ConversationStore, StoreError};
    use crate::connect;
    use crate::migrations::run_pending;

    async fn store() -> ConversationStore {
        let pool = connect("sqlite::memory:").await.expect("connect");
        run_pending(&pool).await.expect("migrate");
        ConversationStore::new(pool)
    }

    #[tokio::test]
    async fn missing_conversation_loads_as_none() {
        let store = store().await;
        let loaded = store.load(&ConversationId::new("conv-1")).await.expect("load");
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn save_then_load_round_trips_state_and_version() {
        let store = store().await;
        let id = ConversationId::new("conv-1");

        let mut state = ConversationState::default();
        state.verified = true;
        state.current_phase = Phase::End;
        state.push_message(Message::user("CUST1234 hello"));

        let version = store.save(&id, &state, None).await.expect("insert");
        assert_eq!(version, 1);

        let loaded = store.load(&id).await.expect("load").expect("row exists");
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.state, state);
    }

    #[tokio::test]
    async fn stale_version_is_rejected() {
        let store = store().await;
        let id = ConversationId::new("conv-1");
        let state = ConversationState::default();

        store.save(&id, &state, None).await.expect("insert");
        store.save(&id, &state, Some(1)).await.expect("first update");

        let conflict = store.save(&id, &state, Some(1)).await;
        assert!(matches!(conflict, Err(StoreError::VersionConflict(_))));
    }

    #[tokio::test]
    async fn duplicate_insert_is_a_conflict() {
        let store = store().await;
        let id = ConversationId::new("conv-1");
        let state = ConversationState::default();

        store.save(&id, &state, None).await.expect("insert");
        let conflict = store.save(&id, &state, None).await;
        assert!(matches!(conflict, Err(StoreError::VersionConflict(_))));
    }

    #[tokio::test]
    async fn undecodable_snapshot_loads_as_new_conversation() {
        let store = store().await;
        let id = ConversationId::new("conv-1");

        sqlx::query(
            "INSERT INTO conversations (conversation_id, state, version, updated_at)
             VALUES (?, 'not json', 4, '2026-01-01T00:00:00Z')",
        )
        .bind(id.as_str())
        .execute(&store.pool)
        .await
        .expect("seed corrupt row");

        let loaded = store.load(&id).await.expect("load");
        assert!(loaded.is_none());
    }

    #[tokio::test]
    async fn snapshot_with_unknown_phase_tag_falls_back_to_verify() {
        let store = store().await;
        let id = ConversationId::new("conv-1");

        sqlx::query(
            "INSERT INTO conversations (conversation_id, state, version, updated_at)
             VALUES (?, '{\"current_phase\": \"hibernate\", \"verified\": true}', 1,
                     '2026-01-01T00:00:00Z')",
        )
        .bind(id.as_str())
        .execute(&store.pool)
        .await
        .expect("seed legacy row");

        let loaded = store.load(&id).await.expect("load").expect("row decodes");
        assert_eq!(loaded.state.current_phase, Phase::Verify);
        assert!(loaded.state.verified);
    }

    #[tokio::test]
    async fn reset_removes_the_row_and_tolerates_absence() {
        let store = store().await;
        let id = ConversationId::new("conv-1");

        store.save(&id, &ConversationState::default(), None).await.expect("insert");
        store.reset(&id).await.expect("reset");
        assert!(store.load(&id).await.expect("load").is_none());

        store.reset(&id).await.expect("second reset is a no-op");
    }
}
