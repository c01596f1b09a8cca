//! Chat-completion provider abstraction.
//!
//! The pipeline only needs "messages in, text out"; [`ChatProvider`] keeps
//! the generation backend swappable without touching retrieval.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::ChatConfig;
use crate::http::{client_with_timeout, join_url, post_json_with_retry, preview};
use crate::workers_ai::WorkersAiClient;

pub const DEFAULT_TEMPERATURE: f32 = 0.2;
pub const DEFAULT_MAX_TOKENS: u32 = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// One generation call. Unset sampling fields fall back to
/// [`DEFAULT_TEMPERATURE`] and [`DEFAULT_MAX_TOKENS`].
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl GenerateRequest {
    fn temperature(&self) -> f32 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)
    }
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    fn model_name(&self) -> &str;
    /// Generate a reply. Fails when the response carries no usable text.
    async fn generate(&self, request: &GenerateRequest) -> Result<String>;
}

/// Always fails; used when `[chat] provider = "disabled"`.
pub struct DisabledChat;

#[async_trait]
impl ChatProvider for DisabledChat {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn generate(&self, _request: &GenerateRequest) -> Result<String> {
        bail!("Chat provider is disabled. Set [chat] provider in config.")
    }
}

/// OpenAI-compatible `POST {base_url}/chat/completions`.
pub struct OpenAiChat {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    max_retries: u32,
}

impl OpenAiChat {
    pub fn new(config: &ChatConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &ChatConfig, api_key: impl Into<String>) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("chat.model required for OpenAI provider"))?;
        let base = config
            .base_url
            .as_deref()
            .unwrap_or(crate::embedding::OPENAI_BASE_URL);

        Ok(Self {
            client: client_with_timeout(config.timeout_secs)?,
            url: join_url(base, "chat/completions"),
            api_key: api_key.into(),
            model,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl ChatProvider for OpenAiChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": request.messages,
            "temperature": request.temperature(),
            "max_tokens": request.max_tokens(),
        });
        let json = post_json_with_retry(
            &self.client,
            &self.url,
            &self.api_key,
            &body,
            self.max_retries,
            "OpenAI chat",
        )
        .await?;

        let text = json
            .pointer("/choices/0/message/content")
            .and_then(|c| c.as_str());
        usable_text(text, &json)
    }
}

/// Cloudflare Workers AI text-generation models (`result.response`).
pub struct WorkersAiChat {
    client: WorkersAiClient,
    model: String,
}

impl WorkersAiChat {
    pub fn new(client: WorkersAiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl ChatProvider for WorkersAiChat {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerateRequest) -> Result<String> {
        let input = serde_json::json!({
            "messages": request.messages,
            "temperature": request.temperature(),
            "max_tokens": request.max_tokens(),
        });
        let result = self.client.run(&self.model, &input).await?;
        let text = result.get("response").and_then(|r| r.as_str());
        usable_text(text, &result)
    }
}

fn usable_text(text: Option<&str>, raw: &serde_json::Value) -> Result<String> {
    match text.map(str::trim) {
        Some(t) if !t.is_empty() => Ok(t.to_string()),
        _ => {
            tracing::debug!(response = %preview(raw), "chat response without text");
            bail!("Chat response missing text")
        }
    }
}

/// Create the configured [`ChatProvider`].
pub fn create_chat_provider(config: &ChatConfig) -> Result<Arc<dyn ChatProvider>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledChat)),
        "openai" => Ok(Arc::new(OpenAiChat::new(config)?)),
        "cloudflare" => {
            let model = config
                .model
                .clone()
                .ok_or_else(|| anyhow::anyhow!("chat.model required for Cloudflare provider"))?;
            let client = WorkersAiClient::from_env(config.base_url.as_deref(), config.timeout_secs)?;
            Ok(Arc::new(WorkersAiChat::new(client, model)))
        }
        other => bail!("Unknown chat provider: {}", other),
    }
}
