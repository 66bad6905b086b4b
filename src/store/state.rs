//! Key/value `state` table: schema bookkeeping plus resumable indexing checkpoints.

use crate::model::{state_keys, CheckpointStage, IndexCheckpoint};

use super::{MetadataStore, StoreError};

pub(super) const SCHEMA_VERSION_KEY: &str = "schema_version";

impl MetadataStore {
    pub fn get_state(&self, key: &str) -> Result<Option<String>, StoreError> {
        let key = key.to_string();
        self.runtime.block_on(async {
            let row: Option<(String,)> = sqlx::query_as("SELECT value FROM state WHERE key = ?")
                .bind(&key)
                .fetch_optional(&self.pool)
                .await?;
            Ok(row.map(|(v,)| v))
        })
    }

    pub fn set_state(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let key = key.to_string();
        let value = value.to_string();
        self.runtime.block_on(async {
            sqlx::query(
                "INSERT INTO state (key, value) VALUES (?, ?)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            )
            .bind(&key)
            .bind(&value)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
    }

    /// Record progress on an in-progress indexing run so it can resume after
    /// an interruption instead of restarting from scratch.
    pub fn save_index_checkpoint(&self, checkpoint: &IndexCheckpoint) -> Result<(), StoreError> {
        self.set_state(state_keys::CHECKPOINT_STAGE, checkpoint.stage.as_str())?;
        self.set_state(state_keys::CHECKPOINT_TOTAL, &checkpoint.total.to_string())?;
        self.set_state(
            state_keys::CHECKPOINT_EMBEDDED,
            &checkpoint.embedded_count.to_string(),
        )?;
        self.set_state(
            state_keys::CHECKPOINT_TIMESTAMP,
            &checkpoint.timestamp.to_string(),
        )?;
        self.set_state(
            state_keys::CHECKPOINT_EMBEDDER_MODEL,
            &checkpoint.embedder_model,
        )?;
        Ok(())
    }

    pub fn load_index_checkpoint(&self) -> Result<Option<IndexCheckpoint>, StoreError> {
        let Some(stage) = self.get_state(state_keys::CHECKPOINT_STAGE)? else {
            return Ok(None);
        };
        let Ok(stage) = stage.parse::<CheckpointStage>() else {
            return Ok(None);
        };
        if stage == CheckpointStage::Complete {
            return Ok(None);
        }
        let total = self
            .get_state(state_keys::CHECKPOINT_TOTAL)?
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        let embedded_count = self
            .get_state(state_keys::CHECKPOINT_EMBEDDED)?
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        let timestamp = self
            .get_state(state_keys::CHECKPOINT_TIMESTAMP)?
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        let embedder_model = self
            .get_state(state_keys::CHECKPOINT_EMBEDDER_MODEL)?
            .unwrap_or_default();
        Ok(Some(IndexCheckpoint {
            stage,
            total,
            embedded_count,
            timestamp,
            embedder_model,
        }))
    }

    pub fn clear_index_checkpoint(&self) -> Result<(), StoreError> {
        for key in [
            state_keys::CHECKPOINT_STAGE,
            state_keys::CHECKPOINT_TOTAL,
            state_keys::CHECKPOINT_EMBEDDED,
            state_keys::CHECKPOINT_TIMESTAMP,
            state_keys::CHECKPOINT_EMBEDDER_MODEL,
        ] {
            self.runtime.block_on(async {
                sqlx::query("DELETE FROM state WHERE key = ?")
                    .bind(key)
                    .execute(&self.pool)
                    .await
            })?;
        }
        Ok(())
    }
}
