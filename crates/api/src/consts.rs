// Request limits
pub const MAX_CHAT_ID_LENGTH: usize = 128;
pub const MAX_MESSAGES_PER_REQUEST: usize = 500;
pub const MAX_IMAGE_PROMPT_LENGTH: usize = 4000;

// Chat stream response headers
pub const STREAM_VERSION_HEADER: &str = "x-chat-stream-version";
pub const STREAM_VERSION: &str = "v1";
pub const SOURCES_HEADER: &str = "x-chat-sources";
pub const REASONING_HEADER: &str = "x-chat-reasoning";
pub const INCLUDED: &str = "included";

pub const SSE_KEEP_ALIVE_SECS: u64 = 15;
