use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Request(String),
    #[error("Server returned {status}: {message}")]
    Http { status: u16, message: String },
    #[error("Invalid stream event: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClientError {
    #[error("A response is already in progress")]
    Busy,
    #[error("Nothing to regenerate")]
    NothingToRegenerate,
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
}
