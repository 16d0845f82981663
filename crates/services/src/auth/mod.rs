pub mod ports;

pub use ports::*;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Session not found or expired")]
    SessionNotFound,
    #[error("Internal error: {0}")]
    InternalError(String),
}

pub struct AuthService {
    session_repository: Arc<dyn SessionRepository>,
}

impl AuthService {
    pub fn new(session_repository: Arc<dyn SessionRepository>) -> Self {
        Self { session_repository }
    }
}

#[async_trait]
impl AuthServiceTrait for AuthService {
    async fn validate_session(
        &self,
        session_token: SessionToken,
    ) -> Result<AuthenticatedUser, AuthError> {
        if session_token.0.trim().is_empty() {
            return Err(AuthError::SessionNotFound);
        }

        let user = self
            .session_repository
            .find_user_by_token(&session_token)
            .await
            .map_err(|e| AuthError::InternalError(format!("Failed to validate session: {e}")))?
            .ok_or(AuthError::SessionNotFound)?;

        debug!(user_id = %user.id, "Session validated");
        Ok(user)
    }
}

/// Accepts any non-empty token as a fixed development user
pub struct MockAuthService;

impl MockAuthService {
    pub fn user() -> AuthenticatedUser {
        AuthenticatedUser {
            id: UserId("dev-user".to_string()),
            name: "Developer".to_string(),
            email: Some("dev@localhost".to_string()),
        }
    }
}

#[async_trait]
impl AuthServiceTrait for MockAuthService {
    async fn validate_session(
        &self,
        session_token: SessionToken,
    ) -> Result<AuthenticatedUser, AuthError> {
        if session_token.0.trim().is_empty() {
            return Err(AuthError::SessionNotFound);
        }
        Ok(Self::user())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_validate_session_resolves_user() {
        let mut repo = MockSessionRepository::new();
        repo.expect_find_user_by_token()
            .withf(|token| token.0 == "good")
            .returning(|_| Ok(Some(MockAuthService::user())));

        let service = AuthService::new(Arc::new(repo));
        let user = service
            .validate_session(SessionToken("good".to_string()))
            .await
            .unwrap();
        assert_eq!(user.name, "Developer");
    }

    #[tokio::test]
    async fn test_validate_session_unknown_token() {
        let mut repo = MockSessionRepository::new();
        repo.expect_find_user_by_token().returning(|_| Ok(None));

        let service = AuthService::new(Arc::new(repo));
        let result = service
            .validate_session(SessionToken("stale".to_string()))
            .await;
        assert!(matches!(result, Err(AuthError::SessionNotFound)));
    }

    #[tokio::test]
    async fn test_validate_session_empty_token_skips_lookup() {
        let repo = MockSessionRepository::new();
        let service = AuthService::new(Arc::new(repo));
        let result = service.validate_session(SessionToken("  ".to_string())).await;
        assert!(matches!(result, Err(AuthError::SessionNotFound)));
    }

    #[tokio::test]
    async fn test_mock_auth_service() {
        let service = MockAuthService;
        assert!(service
            .validate_session(SessionToken("anything".to_string()))
            .await
            .is_ok());
        assert!(service
            .validate_session(SessionToken(String::new()))
            .await
            .is_err());
    }
}
