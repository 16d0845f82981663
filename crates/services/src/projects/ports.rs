use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::UserId;
use crate::common::RepositoryError;

#[cfg(any(test, feature = "test-mocks"))]
use mockall::automock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub user_id: UserId,
    /// Demo URL of the scaffolded app
    pub url: String,
    pub title: String,
    pub files: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewProject {
    pub user_id: UserId,
    pub url: String,
    pub title: String,
    pub files: serde_json::Value,
}

#[cfg_attr(any(test, feature = "test-mocks"), automock)]
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn record(&self, project: NewProject) -> Result<Project, RepositoryError>;

    async fn find_by_url(&self, url: &str) -> Result<Option<Project>, RepositoryError>;
}
