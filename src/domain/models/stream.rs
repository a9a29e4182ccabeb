#[cfg(test)]
#[path = "stream_test.rs"]
mod tests;

use serde_derive::Deserialize;
use serde_derive::Serialize;

/// Name of the only channel the relay serves.
pub const STREAM_CHANNEL: &str = "ai_stream";

/// Requests a client sends over a relay channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Generate { prompt: String },
}

/// Events the relay sends back for a single request. Zero or more `Chunk`s
/// are always followed by exactly one `Complete` or `Error`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum StreamEvent {
    Chunk(String),
    Complete(String),
    Error(String),
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        return !matches!(self, StreamEvent::Chunk(_));
    }
}
