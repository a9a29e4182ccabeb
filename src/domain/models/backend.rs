use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use strum::EnumIter;
use strum::EnumVariantNames;
use strum::IntoEnumIterator;

#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, EnumVariantNames, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum BackendName {
    Ollama,
    OpenAI,
}

impl BackendName {
    pub fn parse(text: String) -> Option<BackendName> {
        return BackendName::iter().find(|e| return e.to_string() == text);
    }
}

/// Incremental text produced by a model. The stream ends when the model is
/// done, and yields an error if generation fails part way.
pub type TextStream = BoxStream<'static, Result<String>>;

/// A model instance configured with a fixed instruction prompt.
#[async_trait]
pub trait ModelSession: Send + Sync {
    fn system_prompt(&self) -> &str;

    fn model(&self) -> &str;

    /// Starts a completion for `text`. No history is kept between calls, only
    /// the system prompt carries over.
    async fn prompt_streaming(&self, text: &str) -> Result<TextStream>;
}

pub type SessionHandle = Arc<dyn ModelSession>;

#[async_trait]
pub trait ModelBackend: Send + Sync {
    fn name(&self) -> BackendName;

    /// Used before creating a session to verify the backend is reachable.
    async fn health_check(&self) -> Result<()>;

    async fn list_models(&self) -> Result<Vec<String>>;

    /// Verifies the backend and resolves which model to talk to, either the
    /// configured one or the first available.
    async fn create_session(&self, system_prompt: &str) -> Result<SessionHandle>;
}

pub type BackendBox = Arc<dyn ModelBackend>;
