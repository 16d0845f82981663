use crate::pool::DbPool;
use crate::repositories::utils::{map_db_error, map_pool_error};
use crate::retry_db;
use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use services::chat::{ChatId, Message, TranscriptStore};
use services::common::RepositoryError;
use tracing::debug;

pub struct PgTranscriptStore {
    pool: DbPool,
}

impl PgTranscriptStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn encode_message(message: &Message) -> Result<serde_json::Value, RepositoryError> {
    serde_json::to_value(message)
        .context("Failed to serialize message")
        .map_err(RepositoryError::DataConversionError)
}

fn decode_message(row: &tokio_postgres::Row) -> Result<Message, RepositoryError> {
    let value: serde_json::Value = row
        .try_get("message")
        .context("Missing message column")
        .map_err(RepositoryError::DataConversionError)?;
    serde_json::from_value(value)
        .context("Stored message does not match the message schema")
        .map_err(RepositoryError::DataConversionError)
}

#[async_trait]
impl TranscriptStore for PgTranscriptStore {
    async fn load_messages(&self, chat_id: &ChatId) -> Result<Vec<Message>, RepositoryError> {
        let rows = retry_db!("load_messages", {
            let client = self.pool.get().await.map_err(map_pool_error)?;
            client
                .query(
                    "SELECT message FROM messages WHERE chat_id = $1 ORDER BY created_at, seq",
                    &[&chat_id.as_str()],
                )
                .await
                .map_err(map_db_error)
        })?;

        rows.iter().map(decode_message).collect()
    }

    /// Insert the messages whose ids are new. Existing rows are left untouched.
    async fn upsert_turn(
        &self,
        chat_id: &ChatId,
        messages: Vec<Message>,
    ) -> Result<Vec<Message>, RepositoryError> {
        let encoded = messages
            .iter()
            .map(|message| Ok((message.id.as_str(), encode_message(message)?)))
            .collect::<Result<Vec<_>, RepositoryError>>()?;

        let rows = retry_db!("upsert_turn", {
            let mut client = self.pool.get().await.map_err(map_pool_error)?;
            let transaction = client.transaction().await.map_err(map_db_error)?;
            let now = Utc::now();

            let mut inserted = Vec::new();
            for (id, message) in &encoded {
                let row = transaction
                    .query_opt(
                        r#"
                    INSERT INTO messages (id, chat_id, message, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $4)
                    ON CONFLICT (id) DO NOTHING
                    RETURNING message
                    "#,
                        &[id, &chat_id.as_str(), message, &now],
                    )
                    .await
                    .map_err(map_db_error)?;
                inserted.extend(row);
            }

            if !inserted.is_empty() {
                transaction
                    .execute(
                        "UPDATE chats SET updated_at = $2 WHERE id = $1",
                        &[&chat_id.as_str(), &now],
                    )
                    .await
                    .map_err(map_db_error)?;
            }

            transaction.commit().await.map_err(map_db_error)?;
            Ok(inserted)
        })?;

        debug!(
            chat_id = %chat_id,
            inserted = rows.len(),
            requested = encoded.len(),
            "Upserted chat turn"
        );
        rows.iter().map(decode_message).collect()
    }
}
