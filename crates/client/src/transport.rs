use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Serialize;
use services::chat::{ChatId, Message, StreamEvent};
use tokio_util::sync::CancellationToken;

use crate::errors::TransportError;

pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, TransportError>> + Send>>;

/// Body of `POST /api/chat`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub id: ChatId,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub web_search: bool,
}

/// Where chat requests go. The returned stream ends early once `cancel` fires.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<EventStream, TransportError>;
}

/// Talks to the chat API over HTTP and reads its SSE response
pub struct HttpChatTransport {
    client: reqwest::Client,
    base_url: String,
    session_token: String,
}

impl HttpChatTransport {
    pub fn new(
        base_url: impl Into<String>,
        session_token: impl Into<String>,
        connect_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            session_token: session_token.into(),
        })
    }
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    async fn send(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<EventStream, TransportError> {
        let url = format!("{}/api/chat", self.base_url);
        tracing::debug!(chat_id = %request.id, messages = request.messages.len(), "Sending chat request");

        let send = self
            .client
            .post(&url)
            .bearer_auth(&self.session_token)
            .header("Accept", "text/event-stream")
            .json(&request)
            .send();

        let response = tokio::select! {
            response = send => response.map_err(|e| TransportError::Request(e.to_string()))?,
            _ = cancel.cancelled() => return Ok(Box::pin(futures::stream::empty())),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Http {
                status: status.as_u16(),
                message: error_message(&body),
            });
        }

        let events = EventStreamParser::new(response.bytes_stream())
            .take_until(cancel.cancelled_owned());
        Ok(Box::pin(events))
    }
}

/// `{"error": {"message": ...}}` bodies from the API, raw text otherwise
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| {
            json.pointer("/error/message")
                .and_then(|message| message.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

/// Splits an SSE byte stream into stream events, buffering partial lines
/// across HTTP chunks
pub struct EventStreamParser<S> {
    inner: S,
    buffer: Vec<u8>,
    pending: VecDeque<Result<StreamEvent, TransportError>>,
    finished: bool,
}

impl<S> EventStreamParser<S>
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            inner: stream,
            buffer: Vec::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    fn process_buffer(&mut self) {
        while let Some(newline_pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim();

            // Blank separators, comments and `event:` names carry nothing the payload lacks
            let Some(data) = line
                .strip_prefix("data: ")
                .or_else(|| line.strip_prefix("data:"))
            else {
                continue;
            };

            let event = serde_json::from_str::<StreamEvent>(data)
                .map_err(|e| TransportError::Decode(format!("{e}: {data}")));
            self.pending.push_back(event);
        }
    }
}

impl<S> Stream for EventStreamParser<S>
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Unpin,
{
    type Item = Result<StreamEvent, TransportError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(result) = self.pending.pop_front() {
                return Poll::Ready(Some(result));
            }
            if self.finished {
                return Poll::Ready(None);
            }

            match Pin::new(&mut self.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    self.buffer.extend_from_slice(&bytes);
                    self.process_buffer();
                }
                Poll::Ready(Some(Err(e))) => {
                    self.finished = true;
                    return Poll::Ready(Some(Err(TransportError::Request(e.to_string()))));
                }
                Poll::Ready(None) => {
                    if !self.buffer.is_empty() {
                        self.buffer.push(b'\n');
                        self.process_buffer();
                    }
                    self.finished = true;
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
