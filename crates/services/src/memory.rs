//! In-memory implementations of the repository ports.
//!
//! Used when no database is configured and by tests across the workspace.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::{AuthenticatedUser, SessionRepository, SessionToken, UserId};
use crate::chat::models::{Chat, ChatId, Message};
use crate::chat::ports::{ChatRepository, TranscriptStore};
use crate::common::RepositoryError;
use crate::files::{FileRepository, StoredFile};
use crate::projects::{NewProject, Project, ProjectRepository};

/// Message rows in insertion order. Ids are unique across chats, like the
/// primary key of the messages table.
#[derive(Default)]
pub struct InMemoryTranscriptStore {
    rows: RwLock<(Vec<(ChatId, Message)>, HashSet<String>)>,
}

impl InMemoryTranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TranscriptStore for InMemoryTranscriptStore {
    async fn load_messages(&self, chat_id: &ChatId) -> Result<Vec<Message>, RepositoryError> {
        let rows = self.rows.read().await;
        Ok(rows
            .0
            .iter()
            .filter(|(id, _)| id == chat_id)
            .map(|(_, message)| message.clone())
            .collect())
    }

    async fn upsert_turn(
        &self,
        chat_id: &ChatId,
        messages: Vec<Message>,
    ) -> Result<Vec<Message>, RepositoryError> {
        let mut rows = self.rows.write().await;
        let (messages_table, ids) = &mut *rows;
        let mut inserted = Vec::new();
        for message in messages {
            if ids.insert(message.id.0.clone()) {
                messages_table.push((chat_id.clone(), message.clone()));
                inserted.push(message);
            }
        }
        Ok(inserted)
    }
}

#[derive(Default)]
pub struct InMemoryChatRepository {
    chats: RwLock<HashMap<ChatId, Chat>>,
}

impl InMemoryChatRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatRepository for InMemoryChatRepository {
    async fn create(
        &self,
        user_id: &UserId,
        chat_id: Option<ChatId>,
    ) -> Result<Chat, RepositoryError> {
        let mut chats = self.chats.write().await;
        let id = chat_id.unwrap_or_else(|| ChatId(Uuid::new_v4().to_string()));
        if chats.contains_key(&id) {
            return Err(RepositoryError::AlreadyExists);
        }
        let now = Utc::now();
        let chat = Chat {
            id: id.clone(),
            user_id: user_id.clone(),
            title: None,
            created_at: now,
            updated_at: now,
        };
        chats.insert(id, chat.clone());
        Ok(chat)
    }

    async fn get(&self, chat_id: &ChatId) -> Result<Option<Chat>, RepositoryError> {
        Ok(self.chats.read().await.get(chat_id).cloned())
    }

    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Chat>, RepositoryError> {
        let mut chats: Vec<Chat> = self
            .chats
            .read()
            .await
            .values()
            .filter(|chat| &chat.user_id == user_id)
            .cloned()
            .collect();
        chats.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(chats)
    }

    async fn update_title(&self, chat_id: &ChatId, title: &str) -> Result<bool, RepositoryError> {
        match self.chats.write().await.get_mut(chat_id) {
            Some(chat) => {
                chat.title = Some(title.to_string());
                chat.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<String, (AuthenticatedUser, DateTime<Utc>)>>,
}

impl InMemorySessionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, token: &str, user: AuthenticatedUser, expires_at: DateTime<Utc>) {
        self.sessions
            .write()
            .await
            .insert(token.to_string(), (user, expires_at));
    }
}

#[async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn find_user_by_token(
        &self,
        token: &SessionToken,
    ) -> Result<Option<AuthenticatedUser>, RepositoryError> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(&token.0)
            .filter(|(_, expires_at)| *expires_at > Utc::now())
            .map(|(user, _)| user.clone()))
    }
}

#[derive(Default)]
pub struct InMemoryFileRepository {
    files: RwLock<Vec<StoredFile>>,
}

impl InMemoryFileRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FileRepository for InMemoryFileRepository {
    async fn record(
        &self,
        user_id: &UserId,
        url: &str,
        media_type: &str,
    ) -> Result<StoredFile, RepositoryError> {
        let file = StoredFile {
            id: Uuid::new_v4(),
            user_id: user_id.clone(),
            url: url.to_string(),
            media_type: media_type.to_string(),
            created_at: Utc::now(),
        };
        self.files.write().await.push(file.clone());
        Ok(file)
    }

    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<StoredFile>, RepositoryError> {
        Ok(self
            .files
            .read()
            .await
            .iter()
            .rev()
            .filter(|file| &file.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryProjectRepository {
    projects: RwLock<Vec<Project>>,
}

impl InMemoryProjectRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProjectRepository for InMemoryProjectRepository {
    async fn record(&self, project: NewProject) -> Result<Project, RepositoryError> {
        let project = Project {
            id: Uuid::new_v4(),
            user_id: project.user_id,
            url: project.url,
            title: project.title,
            files: project.files,
            created_at: Utc::now(),
        };
        self.projects.write().await.push(project.clone());
        Ok(project)
    }

    async fn find_by_url(&self, url: &str) -> Result<Option<Project>, RepositoryError> {
        Ok(self
            .projects
            .read()
            .await
            .iter()
            .rev()
            .find(|project| project.url == url)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::models::MessageId;

    #[tokio::test]
    async fn test_upsert_turn_is_idempotent() {
        let store = InMemoryTranscriptStore::new();
        let chat_id = ChatId::from("c1");
        let turn = vec![
            Message::user_text(MessageId::from("u1"), "hi"),
            Message::assistant_text(MessageId::from("a1"), "hello"),
        ];

        let inserted = store.upsert_turn(&chat_id, turn.clone()).await.unwrap();
        assert_eq!(inserted.len(), 2);

        let inserted = store.upsert_turn(&chat_id, turn).await.unwrap();
        assert!(inserted.is_empty());
        assert_eq!(store.load_messages(&chat_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_upsert_keeps_existing_content() {
        let store = InMemoryTranscriptStore::new();
        let chat_id = ChatId::from("c1");
        store
            .upsert_turn(&chat_id, vec![Message::user_text(MessageId::from("u1"), "first")])
            .await
            .unwrap();
        let inserted = store
            .upsert_turn(
                &chat_id,
                vec![
                    Message::user_text(MessageId::from("u1"), "edited"),
                    Message::assistant_text(MessageId::from("a1"), "reply"),
                ],
            )
            .await
            .unwrap();

        assert_eq!(inserted.len(), 1);
        assert_eq!(inserted[0].id.as_str(), "a1");
        let stored = store.load_messages(&chat_id).await.unwrap();
        assert_eq!(stored[0].text(), "first");
    }

    #[tokio::test]
    async fn test_unknown_chat_loads_empty() {
        let store = InMemoryTranscriptStore::new();
        assert!(store
            .load_messages(&ChatId::from("missing"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_chat_repository() {
        let repo = InMemoryChatRepository::new();
        let user = UserId::from("u1");
        let chat = repo.create(&user, Some(ChatId::from("c1"))).await.unwrap();
        assert!(chat.title.is_none());
        assert!(matches!(
            repo.create(&user, Some(ChatId::from("c1"))).await,
            Err(RepositoryError::AlreadyExists)
        ));

        assert!(repo.update_title(&chat.id, "Rust").await.unwrap());
        assert!(!repo.update_title(&ChatId::from("nope"), "x").await.unwrap());
        let chats = repo.list_by_user(&user).await.unwrap();
        assert_eq!(chats[0].title.as_deref(), Some("Rust"));
        assert!(repo
            .list_by_user(&UserId::from("u2"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_expired_session_is_rejected() {
        let repo = InMemorySessionRepository::new();
        let user = AuthenticatedUser {
            id: UserId::from("u1"),
            name: "Ada".to_string(),
            email: None,
        };
        repo.insert("live", user.clone(), Utc::now() + chrono::Duration::hours(1))
            .await;
        repo.insert("stale", user.clone(), Utc::now() - chrono::Duration::hours(1))
            .await;

        let found = repo
            .find_user_by_token(&SessionToken("live".to_string()))
            .await
            .unwrap();
        assert_eq!(found, Some(user));
        assert!(repo
            .find_user_by_token(&SessionToken("stale".to_string()))
            .await
            .unwrap()
            .is_none());
    }
}
