use crate::pool::DbPool;
use crate::repositories::utils::{map_db_error, map_pool_error};
use crate::retry_db;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use services::auth::UserId;
use services::chat::{Chat, ChatId, ChatRepository};
use services::common::RepositoryError;
use tracing::debug;
use uuid::Uuid;

pub struct PgChatRepository {
    pool: DbPool,
}

impl PgChatRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn row_to_chat(&self, row: tokio_postgres::Row) -> Result<Chat> {
        let id: String = row.try_get("id")?;
        let user_id: String = row.try_get("user_id")?;

        Ok(Chat {
            id: ChatId(id),
            user_id: UserId(user_id),
            title: row.try_get("title")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl ChatRepository for PgChatRepository {
    async fn create(
        &self,
        user_id: &UserId,
        chat_id: Option<ChatId>,
    ) -> Result<Chat, RepositoryError> {
        let id = chat_id.unwrap_or_else(|| ChatId(Uuid::new_v4().to_string()));

        let row = retry_db!("create_chat", {
            let now = Utc::now();
            let client = self.pool.get().await.map_err(map_pool_error)?;
            client
                .query_one(
                    r#"
                INSERT INTO chats (id, user_id, created_at, updated_at)
                VALUES ($1, $2, $3, $3)
                RETURNING *
                "#,
                    &[&id.as_str(), &user_id.0, &now],
                )
                .await
                .map_err(map_db_error)
        })?;

        debug!("Created chat: {} for user: {}", id, user_id);
        self.row_to_chat(row)
            .map_err(RepositoryError::DataConversionError)
    }

    async fn get(&self, chat_id: &ChatId) -> Result<Option<Chat>, RepositoryError> {
        let row = retry_db!("get_chat", {
            let client = self.pool.get().await.map_err(map_pool_error)?;
            client
                .query_opt("SELECT * FROM chats WHERE id = $1", &[&chat_id.as_str()])
                .await
                .map_err(map_db_error)
        })?;

        row.map(|row| self.row_to_chat(row))
            .transpose()
            .map_err(RepositoryError::DataConversionError)
    }

    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Chat>, RepositoryError> {
        let rows = retry_db!("list_chats_by_user", {
            let client = self.pool.get().await.map_err(map_pool_error)?;
            client
                .query(
                    "SELECT * FROM chats WHERE user_id = $1 ORDER BY updated_at DESC",
                    &[&user_id.0],
                )
                .await
                .map_err(map_db_error)
        })?;

        rows.into_iter()
            .map(|row| self.row_to_chat(row))
            .collect::<Result<Vec<_>>>()
            .map_err(RepositoryError::DataConversionError)
    }

    async fn update_title(&self, chat_id: &ChatId, title: &str) -> Result<bool, RepositoryError> {
        let updated = retry_db!("update_chat_title", {
            let client = self.pool.get().await.map_err(map_pool_error)?;
            client
                .execute(
                    "UPDATE chats SET title = $2, updated_at = $3 WHERE id = $1",
                    &[&chat_id.as_str(), &title, &Utc::now()],
                )
                .await
                .map_err(map_db_error)
        })?;

        Ok(updated > 0)
    }
}
