use crate::{ChatCompletionChunk, CompletionError};
use bytes::Bytes;
use futures_util::Stream;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Represents a single SSE event with both raw bytes and parsed content
#[derive(Debug, Clone, serde::Serialize)]
pub struct SSEEvent {
    /// The raw bytes of this SSE event (including "data: " prefix and newline)
    #[serde(skip)]
    pub raw_bytes: Bytes,
    pub chunk: ChatCompletionChunk,
}

/// SSE (Server-Sent Events) stream parser that buffers incomplete
/// events across HTTP chunks
pub struct SSEParser<S> {
    inner: S,
    buffer: String,
    bytes_buffer: Vec<u8>,
    pending: VecDeque<Result<SSEEvent, CompletionError>>,
    finished: bool,
}

impl<S> SSEParser<S>
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Unpin,
{
    pub fn new(stream: S) -> Self {
        Self {
            inner: stream,
            buffer: String::new(),
            bytes_buffer: Vec::new(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    fn parse_sse_event(data: &str) -> Result<Option<ChatCompletionChunk>, CompletionError> {
        if data == "[DONE]" {
            return Ok(None);
        }

        serde_json::from_str::<ChatCompletionChunk>(data)
            .map(Some)
            .map_err(|e| {
                tracing::warn!(error = %e, "Failed to parse chat chunk");
                CompletionError::InvalidResponse(format!("Invalid JSON in SSE event: {e}"))
            })
    }

    fn process_buffer(&mut self) {
        while let Some(newline_pos) = self.buffer.find('\n') {
            let line_len = newline_pos + 1;

            let raw_bytes = Bytes::copy_from_slice(&self.bytes_buffer[..line_len]);
            self.bytes_buffer.drain(..line_len);

            let line = self.buffer.drain(..=newline_pos).collect::<String>();
            let line = line.trim();

            // Skip empty lines and comments
            if line.is_empty() || line.starts_with(':') {
                continue;
            }

            if let Some(data) = line
                .strip_prefix("data: ")
                .or_else(|| line.strip_prefix("data:"))
            {
                match Self::parse_sse_event(data) {
                    Ok(Some(chunk)) => self.pending.push_back(Ok(SSEEvent { raw_bytes, chunk })),
                    Ok(None) => {}
                    Err(e) => self.pending.push_back(Err(e)),
                }
            }
        }
    }
}

impl<S> Stream for SSEParser<S>
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Unpin,
{
    type Item = Result<SSEEvent, CompletionError>;

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
                    self.bytes_buffer.extend_from_slice(&bytes);
                    let text = String::from_utf8_lossy(&bytes);
                    self.buffer.push_str(&text);
                    self.process_buffer();
                }
                Poll::Ready(Some(Err(e))) => {
                    return Poll::Ready(Some(Err(CompletionError::CompletionError(
                        e.to_string(),
                    ))));
                }
                Poll::Ready(None) => {
                    // Flush a trailing event that was not newline-terminated
                    if !self.buffer.trim().is_empty() {
                        self.buffer.push('\n');
                        self.bytes_buffer.push(b'\n');
                        self.process_buffer();
                    }
                    self.finished = true;
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
