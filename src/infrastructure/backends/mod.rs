#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;

pub mod ollama;
pub mod openai;

use std::sync::Arc;

use anyhow::anyhow;
use anyhow::bail;
use anyhow::Result;

use crate::domain::models::BackendBox;
use crate::domain::models::BackendName;

/// Picks the configured model, or the first one the backend offers. Ollama
/// tags are optional, so `llama3` matches `llama3:latest`.
pub fn resolve_model(backend: BackendName, configured: &str, models: Vec<String>) -> Result<String> {
    if configured.is_empty() {
        return models
            .into_iter()
            .next()
            .ok_or_else(|| return anyhow!("Backend {backend} has no models available"));
    }

    let found = models.iter().any(|model| {
        return model == configured || model.starts_with(&format!("{configured}:"));
    });
    if !found {
        bail!("No model named {configured} found in backend {backend}. Did you mistype it?");
    }

    return Ok(configured.to_string());
}

pub struct BackendManager {}

impl BackendManager {
    pub fn get(name: BackendName) -> Result<BackendBox> {
        if name == BackendName::Ollama {
            return Ok(Arc::<ollama::Ollama>::default());
        }

        if name == BackendName::OpenAI {
            return Ok(Arc::<openai::OpenAI>::default());
        }

        bail!(format!("No backend implemented for {name}"))
    }
}
