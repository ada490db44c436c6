pub mod providers;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::config::AppConfig;

#[async_trait]
pub trait LlmProvider: Send + Sync {
    // Execute a single prompt against a model and return the generated text
    async fn generate(&self, model_id: &str, prompt: &str) -> Result<String>;
}

/// Which configured model a prompt is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelRole {
    Chat,
    Routing,
    Geocoding,
}

#[derive(Debug, Clone)]
pub struct ModelSet {
    pub chat: String,
    pub routing: String,
    pub geocoding: String,
}

impl ModelSet {
    pub fn model_for(&self, role: ModelRole) -> &str {
        match role {
            ModelRole::Chat => &self.chat,
            ModelRole::Routing => &self.routing,
            ModelRole::Geocoding => &self.geocoding,
        }
    }
}

/// Front door to the language-model backend: picks the model for a role and
/// bounds every call with the configured timeout.
pub struct LlmManager {
    provider: Arc<dyn LlmProvider>,
    models: ModelSet,
    timeout: Duration,
    enabled: bool,
}

impl LlmManager {
    pub fn new(provider: Arc<dyn LlmProvider>, models: ModelSet, timeout: Duration) -> Self {
        Self {
            provider,
            models,
            timeout,
            enabled: true,
        }
    }

    pub fn from_config(provider: Arc<dyn LlmProvider>, config: &AppConfig) -> Self {
        let models = ModelSet {
            chat: config.gemini.chat_model.clone(),
            routing: config.gemini.routing_model.clone(),
            geocoding: config.gemini.geocoding_model.clone(),
        };
        let mut manager = Self::new(
            provider,
            models,
            Duration::from_secs(config.assistant.request_timeout_secs),
        );
        manager.enabled = config.is_gemini_configured();
        manager
    }

    /// A manager whose every call fails fast, sending callers down their
    /// fallback path.
    pub fn disabled(provider: Arc<dyn LlmProvider>, models: ModelSet) -> Self {
        let mut manager = Self::new(provider, models, Duration::from_secs(1));
        manager.enabled = false;
        manager
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn generate(&self, role: ModelRole, prompt: &str) -> Result<String> {
        if !self.enabled {
            return Err(anyhow!("Gemini API key is not configured"));
        }
        let model_id = self.models.model_for(role);
        debug!("[llm] {:?} prompt -> {} ({} chars)", role, model_id, prompt.len());

        let text = tokio::time::timeout(self.timeout, self.provider.generate(model_id, prompt))
            .await
            .map_err(|_| anyhow!("model call timed out after {:?}", self.timeout))??;

        if text.trim().is_empty() {
            return Err(anyhow!("AI response was empty"));
        }
        Ok(text)
    }

    /// Generate and decode a single JSON object reply.
    pub async fn generate_json<T: DeserializeOwned>(&self, role: ModelRole, prompt: &str) -> Result<T> {
        let text = self.generate(role, prompt).await?;
        parse_json_reply(&text)
    }
}

/// Remove markdown code fences the model likes to wrap JSON in.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "")
        .replace("```JSON", "")
        .replace("```", "")
        .trim()
        .to_string()
}

pub fn parse_json_reply<T: DeserializeOwned>(text: &str) -> Result<T> {
    let clean = strip_code_fences(text);
    if clean.is_empty() {
        return Err(anyhow!("AI response was empty"));
    }
    serde_json::from_str(&clean).map_err(|e| anyhow!("AI response is not valid JSON: {}", e))
}

/// The one place remote failures are absorbed. Awaits `attempt`; on any error
/// logs it under `component` and returns `fallback()` instead. Nothing past
/// this boundary ever sees the error.
pub async fn or_fallback<T, Fut, F>(component: &str, attempt: Fut, fallback: F) -> T
where
    Fut: Future<Output = Result<T>>,
    F: FnOnce() -> T,
{
    match attempt.await {
        Ok(value) => value,
        Err(e) => {
            warn!("[{}] remote call failed, using fallback: {}", component, e);
            fallback()
        }
    }
}
