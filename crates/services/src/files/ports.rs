use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::UserId;
use crate::common::RepositoryError;

#[cfg(any(test, feature = "test-mocks"))]
use mockall::automock;

/// A file produced for a user, e.g. a generated image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub id: Uuid,
    pub user_id: UserId,
    pub url: String,
    pub media_type: String,
    pub created_at: DateTime<Utc>,
}

#[cfg_attr(any(test, feature = "test-mocks"), automock)]
#[async_trait]
pub trait FileRepository: Send + Sync {
    async fn record(
        &self,
        user_id: &UserId,
        url: &str,
        media_type: &str,
    ) -> Result<StoredFile, RepositoryError>;

    /// Newest first
    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<StoredFile>, RepositoryError>;
}
