pub mod chat;
pub mod file;
pub mod project;
pub mod retry;
pub mod session;
pub mod transcript;
pub mod utils;

pub use chat::PgChatRepository;
pub use file::PgFileRepository;
pub use project::PgProjectRepository;
pub use session::PgSessionRepository;
pub use transcript::PgTranscriptStore;
