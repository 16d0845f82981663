use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use super::errors::ChatError;
use super::models::{Chat, ChatId, ChatStreamRequest, Message, StreamEvent};
use crate::auth::{AuthenticatedUser, UserId};
use crate::common::RepositoryError;

#[cfg(any(test, feature = "test-mocks"))]
use mockall::automock;

pub type ChatEventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Durable transcript of a chat
#[cfg_attr(any(test, feature = "test-mocks"), automock)]
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    /// Messages of a chat in insertion order; empty when the chat is unknown
    async fn load_messages(&self, chat_id: &ChatId) -> Result<Vec<Message>, RepositoryError>;

    /// Insert the messages whose ids are not stored yet and return only
    /// those. Messages with an existing id are left untouched.
    async fn upsert_turn(
        &self,
        chat_id: &ChatId,
        messages: Vec<Message>,
    ) -> Result<Vec<Message>, RepositoryError>;
}

#[cfg_attr(any(test, feature = "test-mocks"), automock)]
#[async_trait]
pub trait ChatRepository: Send + Sync {
    /// Create a chat; a client-chosen id is kept when given
    async fn create(
        &self,
        user_id: &UserId,
        chat_id: Option<ChatId>,
    ) -> Result<Chat, RepositoryError>;

    async fn get(&self, chat_id: &ChatId) -> Result<Option<Chat>, RepositoryError>;

    /// Most recently updated first
    async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Chat>, RepositoryError>;

    async fn update_title(&self, chat_id: &ChatId, title: &str) -> Result<bool, RepositoryError>;
}

#[cfg_attr(any(test, feature = "test-mocks"), automock)]
#[async_trait]
pub trait ChatServiceTrait: Send + Sync {
    /// Run one assistant turn and stream its events
    async fn create_chat_stream(
        &self,
        request: ChatStreamRequest,
        user: AuthenticatedUser,
    ) -> Result<ChatEventStream, ChatError>;

    async fn create_chat(
        &self,
        user: &AuthenticatedUser,
        chat_id: Option<ChatId>,
    ) -> Result<Chat, ChatError>;

    async fn list_chats(&self, user: &AuthenticatedUser) -> Result<Vec<Chat>, ChatError>;

    /// Stored transcript of a chat owned by `user`
    async fn load_chat(
        &self,
        chat_id: &ChatId,
        user: &AuthenticatedUser,
    ) -> Result<Vec<Message>, ChatError>;
}
