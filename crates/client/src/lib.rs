//! Client side of the chat stream.
//!
//! `ChatState` folds stream events into the message list a UI renders,
//! `ChatSession` drives requests through a `ChatTransport` and resubmits
//! automatically once every tool call of the last step has a result.

pub mod continuation;
pub mod errors;
pub mod session;
pub mod state;
pub mod transport;

pub use continuation::last_assistant_message_is_complete_with_tool_calls;
pub use errors::{ClientError, TransportError};
pub use session::ChatSession;
pub use state::{Attachment, ChatState, ChatStatus};
pub use transport::{ChatRequest, ChatTransport, EventStream, HttpChatTransport};
