//! Providers reached over HTTP

pub mod openai_compatible;

pub use openai_compatible::{OpenAiCompatibleProvider, ProviderConfig};
