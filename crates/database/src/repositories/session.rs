use crate::pool::DbPool;
use crate::repositories::utils::{map_db_error, map_pool_error};
use crate::retry_db;
use async_trait::async_trait;
use chrono::Utc;
use services::auth::{AuthenticatedUser, SessionRepository, SessionToken, UserId};
use services::common::RepositoryError;

/// Reads sessions issued by the sign-in service
pub struct PgSessionRepository {
    pool: DbPool,
}

impl PgSessionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn find_user_by_token(
        &self,
        token: &SessionToken,
    ) -> Result<Option<AuthenticatedUser>, RepositoryError> {
        let row = retry_db!("find_user_by_session_token", {
            let client = self.pool.get().await.map_err(map_pool_error)?;
            client
                .query_opt(
                    r#"
                SELECT u.id, u.name, u.email
                FROM session s
                JOIN "user" u ON u.id = s.user_id
                WHERE s.token = $1 AND s.expires_at > $2
                "#,
                    &[&token.0, &Utc::now()],
                )
                .await
                .map_err(map_db_error)
        })?;

        let Some(row) = row else {
            return Ok(None);
        };
        let convert = |e: tokio_postgres::Error| RepositoryError::DataConversionError(e.into());
        Ok(Some(AuthenticatedUser {
            id: UserId(row.try_get("id").map_err(convert)?),
            name: row.try_get("name").map_err(convert)?,
            email: row.try_get("email").map_err(convert)?,
        }))
    }
}
