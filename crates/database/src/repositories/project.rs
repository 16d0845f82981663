use crate::pool::DbPool;
use crate::repositories::utils::{map_db_error, map_pool_error};
use crate::retry_db;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use services::auth::UserId;
use services::common::RepositoryError;
use services::projects::{NewProject, Project, ProjectRepository};
use tracing::debug;
use uuid::Uuid;

pub struct PgProjectRepository {
    pool: DbPool,
}

impl PgProjectRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn row_to_project(&self, row: tokio_postgres::Row) -> Result<Project> {
        let user_id: String = row.try_get("user_id")?;
        Ok(Project {
            id: row.try_get("id")?,
            user_id: UserId(user_id),
            url: row.try_get("url")?,
            title: row.try_get("title")?,
            files: row.try_get("files")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl ProjectRepository for PgProjectRepository {
    async fn record(&self, project: NewProject) -> Result<Project, RepositoryError> {
        let id = Uuid::new_v4();

        let row = retry_db!("record_project", {
            let client = self.pool.get().await.map_err(map_pool_error)?;
            client
                .query_one(
                    r#"
                INSERT INTO projects (id, user_id, url, title, files, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (id) DO UPDATE SET id = EXCLUDED.id
                RETURNING *
                "#,
                    &[
                        &id,
                        &project.user_id.0,
                        &project.url,
                        &project.title,
                        &project.files,
                        &Utc::now(),
                    ],
                )
                .await
                .map_err(map_db_error)
        })?;

        debug!("Recorded project: {} at {}", id, project.url);
        self.row_to_project(row)
            .map_err(RepositoryError::DataConversionError)
    }

    /// The most recent project built at `url`
    async fn find_by_url(&self, url: &str) -> Result<Option<Project>, RepositoryError> {
        let row = retry_db!("find_project_by_url", {
            let client = self.pool.get().await.map_err(map_pool_error)?;
            client
                .query_opt(
                    "SELECT * FROM projects WHERE url = $1 ORDER BY created_at DESC LIMIT 1",
                    &[&url],
                )
                .await
                .map_err(map_db_error)
        })?;

        row.map(|row| self.row_to_project(row))
            .transpose()
            .map_err(RepositoryError::DataConversionError)
    }
}
