pub mod ports;

pub use ports::{NewProject, Project, ProjectRepository};

use std::sync::Arc;

use crate::auth::AuthenticatedUser;
use crate::common::RepositoryError;

#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("Project not found")]
    NotFound,
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Read access to projects scaffolded by the app builder
pub struct ProjectService {
    repository: Arc<dyn ProjectRepository>,
}

impl ProjectService {
    pub fn new(repository: Arc<dyn ProjectRepository>) -> Self {
        Self { repository }
    }

    /// The caller's project served at `url`
    pub async fn find_by_url(
        &self,
        url: &str,
        user: &AuthenticatedUser,
    ) -> Result<Project, ProjectError> {
        if url.trim().is_empty() {
            return Err(ProjectError::InvalidParams("url is required".to_string()));
        }
        match self.repository.find_by_url(url).await? {
            Some(project) if project.user_id == user.id => Ok(project),
            _ => Err(ProjectError::NotFound),
        }
    }
}
