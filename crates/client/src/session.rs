use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::errors::ClientError;
use crate::state::{Attachment, ChatState};
use crate::transport::{ChatRequest, ChatTransport};

/// Drives one chat: sends requests, feeds the events into the shared
/// state and resubmits after completed tool rounds
pub struct ChatSession {
    state: Arc<Mutex<ChatState>>,
    transport: Arc<dyn ChatTransport>,
    model: Option<String>,
    web_search: bool,
    timeout: Option<Duration>,
    cancel: Mutex<CancellationToken>,
}

impl ChatSession {
    pub fn new(transport: Arc<dyn ChatTransport>, state: ChatState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            transport,
            model: None,
            web_search: false,
            timeout: None,
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_web_search(mut self, web_search: bool) -> Self {
        self.web_search = web_search;
        self
    }

    /// Give up on a request (including its continuations) after `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Shared state, for rendering
    pub fn state(&self) -> Arc<Mutex<ChatState>> {
        self.state.clone()
    }

    pub async fn snapshot(&self) -> ChatState {
        self.state.lock().await.clone()
    }

    /// Append the user's message and start streaming the answer. The
    /// message is in the state before this returns.
    pub async fn send_message(
        &self,
        text: &str,
        attachments: Vec<Attachment>,
    ) -> Result<JoinHandle<()>, ClientError> {
        let mut state = self.state.lock().await;
        state.submit_user_message(text, attachments)?;
        let request = self.request_for(&state);
        Ok(self.spawn(request).await)
    }

    /// Answer the last user message again
    pub async fn regenerate(&self) -> Result<JoinHandle<()>, ClientError> {
        let mut state = self.state.lock().await;
        if state.is_busy() {
            return Err(ClientError::Busy);
        }
        if !state.truncate_for_regenerate() {
            return Err(ClientError::NothingToRegenerate);
        }
        state.begin_request();
        let request = self.request_for(&state);
        Ok(self.spawn(request).await)
    }

    /// Cancel the in-flight request; streamed content stays
    pub async fn stop(&self) {
        let mut state = self.state.lock().await;
        self.cancel.lock().await.cancel();
        state.stop();
    }

    fn request_for(&self, state: &ChatState) -> ChatRequest {
        ChatRequest {
            id: state.chat_id.clone(),
            messages: state.messages.clone(),
            model: self.model.clone(),
            web_search: self.web_search,
        }
    }

    /// Install a fresh token and start the driver. Callers hold the state
    /// lock so a concurrent `stop` sees either the old request or this one.
    async fn spawn(&self, request: ChatRequest) -> JoinHandle<()> {
        let cancel = CancellationToken::new();
        *self.cancel.lock().await = cancel.clone();

        let driver = Driver {
            state: self.state.clone(),
            transport: self.transport.clone(),
            model: self.model.clone(),
            web_search: self.web_search,
            timeout: self.timeout,
            cancel,
        };
        tokio::spawn(driver.run(request))
    }
}

struct Driver {
    state: Arc<Mutex<ChatState>>,
    transport: Arc<dyn ChatTransport>,
    model: Option<String>,
    web_search: bool,
    timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl Driver {
    async fn run(self, request: ChatRequest) {
        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.drive(request))
                .await
                .unwrap_or(Err(ClientError::Timeout(limit))),
            None => self.drive(request).await,
        };

        if let Err(e) = result {
            tracing::warn!(error = %e, "Chat request failed");
            let mut state = self.state.lock().await;
            if !self.cancel.is_cancelled() || matches!(e, ClientError::Timeout(_)) {
                state.fail(e.to_string());
            }
            self.cancel.cancel();
        }
    }

    /// Stream `request`, then keep continuing while the latest step ended
    /// with every tool call answered
    async fn drive(&self, mut request: ChatRequest) -> Result<(), ClientError> {
        loop {
            self.stream_once(request).await?;

            let mut state = self.state.lock().await;
            if self.cancel.is_cancelled() {
                return Ok(());
            }
            state.finish_stream();
            let Some(message_id) = state.take_continuation() else {
                return Ok(());
            };
            tracing::debug!(chat_id = %state.chat_id, %message_id, "Continuing after tool results");
            state.begin_request();
            request = ChatRequest {
                id: state.chat_id.clone(),
                messages: state.messages.clone(),
                model: self.model.clone(),
                web_search: self.web_search,
            };
        }
    }

    async fn stream_once(&self, request: ChatRequest) -> Result<(), ClientError> {
        let mut events = self.transport.send(request, self.cancel.clone()).await?;
        while let Some(event) = events.next().await {
            let event = event?;
            let mut state = self.state.lock().await;
            if self.cancel.is_cancelled() {
                break;
            }
            state.apply(&event);
        }
        Ok(())
    }
}
