use crate::pool::DbPool;
use crate::repositories::utils::{map_db_error, map_pool_error};
use crate::retry_db;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use services::auth::UserId;
use services::common::RepositoryError;
use services::files::{FileRepository, StoredFile};
use tracing::debug;
use uuid::Uuid;

pub struct PgFileRepository {
    pool: DbPool,
}

impl PgFileRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn row_to_file(&self, row: tokio_postgres::Row) -> Result<StoredFile> {
        let user_id: String = row.try_get("user_id")?;
        Ok(StoredFile {
            id: row.try_get("id")?,
            user_id: UserId(user_id),
            url: row.try_get("url")?,
            media_type: row.try_get("media_type")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl FileRepository for PgFileRepository {
    async fn record(
        &self,
        user_id: &UserId,
        url: &str,
        media_type: &str,
    ) -> Result<StoredFile, RepositoryError> {
        let id = Uuid::new_v4();

        let row = retry_db!("record_file", {
            let client = self.pool.get().await.map_err(map_pool_error)?;
            client
                .query_one(
                    r#"
                INSERT INTO files (id, user_id, url, media_type, created_at)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (id) DO UPDATE SET id = EXCLUDED.id
                RETURNING *
                "#,
                    &[&id, &user_id.0, &url, &media_type, &Utc::now()],
                )
                .await
                .map_err(map_db_error)
        })?;

        debug!("Recorded file: {} ({}) for user: {}", id, media_type, user_id);
        self.row_to_file(row)
            .map_err(RepositoryError::DataConversionError)
    }

    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<StoredFile>, RepositoryError> {
        let rows = retry_db!("list_files_by_user", {
            let client = self.pool.get().await.map_err(map_pool_error)?;
            client
                .query(
                    "SELECT * FROM files WHERE user_id = $1 ORDER BY created_at DESC",
                    &[&user_id.0],
                )
                .await
                .map_err(map_db_error)
        })?;

        rows.into_iter()
            .map(|row| self.row_to_file(row))
            .collect::<Result<Vec<_>>>()
            .map_err(RepositoryError::DataConversionError)
    }
}
