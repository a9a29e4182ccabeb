#[cfg(test)]
#[path = "openai_test.rs"]
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
struct Model {
    id: String,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ModelListResponse {
    data: Vec<Model>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct MessageRequest {
    role: String,
    content: String,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<MessageRequest>,
    stream: bool,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CompletionDeltaResponse {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CompletionChoiceResponse {
    delta: CompletionDeltaResponse,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CompletionErrorResponse {
    message: String,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoiceResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<CompletionErrorResponse>,
}

/// Reads server sent events until the next delta with text. `[DONE]` ends the
/// stream.
async fn next_chunk<R: AsyncBufRead + Unpin>(
    mut lines: Lines<R>,
) -> Result<Option<(String, Lines<R>)>> {
    while let Some(line) = lines.next_line().await? {
        let mut cleaned_line = line.trim().to_string();
        if cleaned_line.starts_with("data:") {
            cleaned_line = cleaned_line.split_off(5).trim().to_string();
        }
        if cleaned_line.is_empty() {
            continue;
        }
        if cleaned_line == "[DONE]" {
            return Ok(None);
        }

        let ores: CompletionResponse = serde_json::from_str(&cleaned_line)?;
        tracing::debug!(body = ?ores, "Completion response");
        if let Some(err) = ores.error {
            bail!("OpenAI failed to generate: {}", err.message);
        }

        let text = ores
            .choices
            .into_iter()
            .next()
            .and_then(|choice| return choice.delta.content)
            .unwrap_or_default();
        if text.is_empty() {
            continue;
        }

        return Ok(Some((text, lines)));
    }

    return Ok(None);
}

pub struct OpenAISession {
    url: String,
    token: String,
    model: String,
    system_prompt: String,
}

#[async_trait]
impl ModelSession for OpenAISession {
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
            messages: vec![
                MessageRequest {
                    role: "system".to_string(),
                    content: self.system_prompt.to_string(),
                },
                MessageRequest {
                    role: "user".to_string(),
                    content: text.to_string(),
                },
            ],
            stream: true,
        };

        let mut builder = reqwest::Client::new()
            .post(format!("{url}/v1/chat/completions", url = self.url))
            .json(&req);
        if !self.token.is_empty() {
            builder = builder.bearer_auth(&self.token);
        }

        let res = builder.send().await?;

        if !res.status().is_success() {
            tracing::error!(
                status = res.status().as_u16(),
                "Failed to make completion request to OpenAI"
            );
            bail!("Failed to make completion request to OpenAI");
        }

        let body = res.bytes_stream().map_err(convert_err);
        let lines = StreamReader::new(body).lines();

        return Ok(Box::pin(stream::try_unfold(lines, next_chunk)));
    }
}

/// Any server speaking the OpenAI chat completions protocol. Local servers
/// such as llama.cpp or LM Studio usually need no token.
pub struct OpenAI {
    url: String,
    token: String,
    model: String,
    timeout: String,
}

impl Default for OpenAI {
    fn default() -> OpenAI {
        return OpenAI {
            url: Config::get(ConfigKey::OpenaiURL),
            token: Config::get(ConfigKey::OpenaiToken),
            model: Config::get(ConfigKey::Model),
            timeout: Config::get(ConfigKey::BackendHealthCheckTimeout),
        };
    }
}

#[async_trait]
impl ModelBackend for OpenAI {
    fn name(&self) -> BackendName {
        return BackendName::OpenAI;
    }

    #[allow(clippy::implicit_return)]
    async fn health_check(&self) -> Result<()> {
        if self.url.is_empty() {
            bail!("OpenAI URL is not defined");
        }

        let res = reqwest::Client::new()
            .get(&self.url)
            .timeout(Duration::from_millis(self.timeout.parse::<u64>()?))
            .send()
            .await;

        let status = match res {
            Ok(res) => res.status().as_u16(),
            Err(err) => {
                tracing::error!(error = ?err, "OpenAI is not reachable");
                bail!("OpenAI is not reachable");
            }
        };

        // Some servers answer the index with a 404, only treat server errors as
        // unhealthy.
        if status >= 500 {
            tracing::error!(status = status, "OpenAI health check failed");
            bail!("OpenAI health check failed");
        }

        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn list_models(&self) -> Result<Vec<String>> {
        let mut builder = reqwest::Client::new().get(format!("{url}/v1/models", url = self.url));
        if !self.token.is_empty() {
            builder = builder.bearer_auth(&self.token);
        }

        let res = builder.send().await?.json::<ModelListResponse>().await?;

        let mut models: Vec<String> = res
            .data
            .iter()
            .map(|model| {
                return model.id.to_string();
            })
            .collect();

        models.sort();

        return Ok(models);
    }

    #[allow(clippy::implicit_return)]
    async fn create_session(&self, system_prompt: &str) -> Result<SessionHandle> {
        self.health_check().await?;
        let model = super::resolve_model(self.name(), &self.model, self.list_models().await?)?;
        tracing::info!(%model, "Created OpenAI session");

        return Ok(Arc::new(OpenAISession {
            url: self.url.to_string(),
            token: self.token.to_string(),
            model,
            system_prompt: system_prompt.to_string(),
        }));
    }
}
