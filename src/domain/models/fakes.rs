use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use anyhow::Result;
use async_trait::async_trait;
use futures::stream;
use futures::StreamExt;

use super::BackendName;
use super::ModelBackend;
use super::ModelSession;
use super::SessionHandle;
use super::TextStream;

/// Scripted output for a `FakeSession`.
#[derive(Clone, Default)]
pub struct Script {
    pub chunks: Vec<String>,
    pub fail_with: Option<String>,
    /// Never finishes after the scripted chunks.
    pub hang: bool,
    pub delay: Duration,
}

impl Script {
    pub fn chunks(chunks: &[&str]) -> Script {
        return Script {
            chunks: chunks.iter().map(|e| return e.to_string()).collect(),
            ..Script::default()
        };
    }

    pub fn failing(chunks: &[&str], err: &str) -> Script {
        let mut script = Script::chunks(chunks);
        script.fail_with = Some(err.to_string());
        return script;
    }

    pub fn hanging(chunks: &[&str]) -> Script {
        let mut script = Script::chunks(chunks);
        script.hang = true;
        return script;
    }
}

pub struct FakeSession {
    pub system_prompt: String,
    pub script: Script,
    pub prompts: Arc<std::sync::Mutex<Vec<String>>>,
}

#[async_trait]
impl ModelSession for FakeSession {
    fn system_prompt(&self) -> &str {
        return &self.system_prompt;
    }

    fn model(&self) -> &str {
        return "fake";
    }

    #[allow(clippy::implicit_return)]
    async fn prompt_streaming(&self, text: &str) -> Result<TextStream> {
        self.prompts.lock().unwrap().push(text.to_string());

        let script = self.script.clone();
        let delay = script.delay;
        let mut items: Vec<Result<String>> = script.chunks.into_iter().map(Ok).collect();
        if let Some(err) = script.fail_with {
            items.push(Err(anyhow::anyhow!(err)));
        }

        let chunks = stream::iter(items).then(move |item| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            return item;
        });

        if script.hang {
            return Ok(Box::pin(chunks.chain(stream::pending())));
        }

        return Ok(Box::pin(chunks));
    }
}

/// Counts how often a session is created, optionally failing or stalling
/// creation.
#[derive(Clone, Default)]
pub struct FakeBackend {
    pub creates: Arc<AtomicUsize>,
    pub create_delay: Duration,
    pub fail_with: Option<String>,
    pub script: Script,
    pub prompts: Arc<std::sync::Mutex<Vec<String>>>,
}

impl FakeBackend {
    pub fn with_script(script: Script) -> FakeBackend {
        return FakeBackend {
            script,
            ..FakeBackend::default()
        };
    }

    pub fn create_count(&self) -> usize {
        return self.creates.load(Ordering::SeqCst);
    }
}

#[async_trait]
impl ModelBackend for FakeBackend {
    fn name(&self) -> BackendName {
        return BackendName::Ollama;
    }

    #[allow(clippy::implicit_return)]
    async fn health_check(&self) -> Result<()> {
        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn list_models(&self) -> Result<Vec<String>> {
        return Ok(vec!["fake".to_string()]);
    }

    #[allow(clippy::implicit_return)]
    async fn create_session(&self, system_prompt: &str) -> Result<SessionHandle> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if !self.create_delay.is_zero() {
            tokio::time::sleep(self.create_delay).await;
        }

        if let Some(err) = &self.fail_with {
            bail!(err.to_string());
        }

        return Ok(Arc::new(FakeSession {
            system_prompt: system_prompt.to_string(),
            script: self.script.clone(),
            prompts: self.prompts.clone(),
        }));
    }
}
