use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::common::RepositoryError;

#[cfg(any(test, feature = "test-mocks"))]
use mockall::automock;

// Domain ID types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct UserId(pub String);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SessionToken(pub String);

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        UserId(value.to_string())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The identity attached to a request once its session has been validated
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthenticatedUser {
    pub id: UserId,
    pub name: String,
    pub email: Option<String>,
}

#[cfg_attr(any(test, feature = "test-mocks"), automock)]
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Resolve an unexpired session token to its user
    async fn find_user_by_token(
        &self,
        token: &SessionToken,
    ) -> Result<Option<AuthenticatedUser>, RepositoryError>;
}

#[cfg_attr(any(test, feature = "test-mocks"), automock)]
#[async_trait]
pub trait AuthServiceTrait: Send + Sync {
    async fn validate_session(
        &self,
        token: SessionToken,
    ) -> Result<AuthenticatedUser, super::AuthError>;
}
