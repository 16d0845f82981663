//! Re-chunks model text into whole words (or lines) before it is emitted.
//!
//! Chunking never drops or reorders characters: the concatenation of all
//! released chunks plus the final flush equals the concatenation of the input.

use config::SmoothChunking;
use regex::Regex;
use std::sync::LazyLock;

static WORD_CHUNK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\S+\s+").expect("Failed to compile word chunk regex"));
static LINE_CHUNK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n+").expect("Failed to compile line chunk regex"));

pub struct TextSmoother {
    buffer: String,
    chunking: SmoothChunking,
}

impl TextSmoother {
    pub fn new(chunking: SmoothChunking) -> Self {
        Self {
            buffer: String::new(),
            chunking,
        }
    }

    fn pattern(&self) -> &'static Regex {
        match self.chunking {
            SmoothChunking::Word => &WORD_CHUNK,
            SmoothChunking::Line => &LINE_CHUNK,
        }
    }

    /// Buffer `delta` and return every chunk that is now complete
    pub fn push(&mut self, delta: &str) -> Vec<String> {
        self.buffer.push_str(delta);

        let mut chunks = Vec::new();
        while let Some(end) = self.pattern().find(&self.buffer).map(|m| m.end()) {
            chunks.push(self.buffer.drain(..end).collect());
        }
        chunks
    }

    /// Release whatever is left, e.g. a final word without trailing whitespace
    pub fn flush(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}
