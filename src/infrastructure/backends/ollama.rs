#[cfg(test)]
#[path = "ollama_test.rs"]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use anyhow::Result;
use async_trait::async_trait;
use futures::stream;
use futures::stream::TryStreamExt;
use serde_derive::Deserialize;
use serde_derive::Serialize;
use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt;
use tokio::io::Lines;
use tokio_util::io::StreamReader;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::BackendName;
use crate::domain::models::ModelBackend;
use crate::domain::models::ModelSession;
use crate::domain::models::SessionHandle;
use crate::domain::models::TextStream;

fn convert_err(err: reqwest::Error) -> std::io::Error {
    let err_msg = err.to_string();
    return std::io::Error::new(std::io::ErrorKind::Interrupted, err_msg);
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CompletionRequest {
    model: String,
    prompt: String,
    system: String,
    stream: bool,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Model {
    name: String,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ModelListResponse {
    models: Vec<Model>,
}

/// Reads lines until the next piece of text, skipping blanks. Returns `None`
/// once Ollama reports it is done or the body ends.
async fn next_chunk<R: AsyncBufRead + Unpin>(
    mut lines: Lines<R>,
) -> Result<Option<(String, Lines<R>)>> {
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let ores: CompletionResponse = serde_json::from_str(&line)?;
        tracing::debug!(body = ?ores, "Completion response");
        if let Some(err) = ores.error {
            bail!("Ollama failed to generate: {err}");
        }
        if ores.done && ores.response.is_empty() {
            return Ok(None);
        }
        if ores.response.is_empty() {
            continue;
        }

        return Ok(Some((ores.response, lines)));
    }

    return Ok(None);
}

pub struct OllamaSession {
    url: String,
    model: String,
    system_prompt: String,
}

#[async_trait]
impl ModelSession for OllamaSession {
    fn system_prompt(&self) -> &str {
        return &self.system_prompt;
    }

    fn model(&self) -> &str {
        return &self.model;
    }

    #[allow(clippy::implicit_return)]
    async fn prompt_streaming(&self, text: &str) -> Result<TextStream> {
        let req = CompletionRequest {
            model: self.model.to_string(),
            prompt: text.to_string(),
            system: self.system_prompt.to_string(),
            stream: true,
        };

        let res = reqwest::Client::new()
            .post(format!("{url}/api/generate", url = self.url))
            .json(&req)
            .send()
            .await?;

        if !res.status().is_success() {
            tracing::error!(
                status = res.status().as_u16(),
                "Failed to make completion request to Ollama"
            );
            bail!("Failed to make completion request to Ollama");
        }

        let body = res.bytes_stream().map_err(convert_err);
        let lines = StreamReader::new(body).lines();

        return Ok(Box::pin(stream::try_unfold(lines, next_chunk)));
    }
}

pub struct Ollama {
    url: String,
    model: String,
    timeout: String,
}

impl Default for Ollama {
    fn default() -> Ollama {
        return Ollama {
            url: Config::get(ConfigKey::OllamaURL),
            model: Config::get(ConfigKey::Model),
            timeout: Config::get(ConfigKey::BackendHealthCheckTimeout),
        };
    }
}

#[async_trait]
impl ModelBackend for Ollama {
    fn name(&self) -> BackendName {
        return BackendName::Ollama;
    }

    #[allow(clippy::implicit_return)]
    async fn health_check(&self) -> Result<()> {
        let res = reqwest::Client::new()
            .get(&self.url)
            .timeout(Duration::from_millis(self.timeout.parse::<u64>()?))
            .send()
            .await;

        let res = match res {
            Ok(res) => res,
            Err(err) => {
                tracing::error!(error = ?err, "Ollama is not running");
                bail!("Ollama is not running");
            }
        };

        if res.status() != 200 {
            tracing::error!(status = res.status().as_u16(), "Ollama health check failed");
            bail!("Ollama health check failed");
        }

        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn list_models(&self) -> Result<Vec<String>> {
        let res = reqwest::Client::new()
            .get(format!("{url}/api/tags", url = self.url))
            .send()
            .await?
            .json::<ModelListResponse>()
            .await?;

        let mut models: Vec<String> = res
            .models
            .iter()
            .map(|model| {
                return model.name.to_string();
            })
            .collect();

        models.sort();

        return Ok(models);
    }

    #[allow(clippy::implicit_return)]
    async fn create_session(&self, system_prompt: &str) -> Result<SessionHandle> {
        self.health_check().await?;
        let model = super::resolve_model(self.name(), &self.model, self.list_models().await?)?;
        tracing::info!(%model, "Created Ollama session");

        return Ok(Arc::new(OllamaSession {
            url: self.url.to_string(),
            model,
            system_prompt: system_prompt.to_string(),
        }));
    }
}
