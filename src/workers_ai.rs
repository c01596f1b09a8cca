//! Minimal Cloudflare Workers AI client.
//!
//! Every model is invoked through `POST {base}/accounts/{account}/ai/run/{model}`.
//! Model ids look like `@cf/vendor/model-name`; each `/`-separated segment is
//! percent-encoded on its own so the separators survive in the URL.

use anyhow::{bail, Context, Result};
use reqwest::Url;

use crate::http::{client_with_timeout, preview};

pub const DEFAULT_BASE_URL: &str = "https://api.cloudflare.com/client/v4";

#[derive(Debug, Clone)]
pub struct WorkersAiClient {
    http: reqwest::Client,
    base_url: String,
    account_id: String,
    api_token: String,
}

impl WorkersAiClient {
    pub fn new(
        base_url: Option<&str>,
        account_id: impl Into<String>,
        api_token: impl Into<String>,
        timeout_secs: u64,
    ) -> Result<Self> {
        Ok(Self {
            http: client_with_timeout(timeout_secs)?,
            base_url: base_url.unwrap_or(DEFAULT_BASE_URL).to_string(),
            account_id: account_id.into(),
            api_token: api_token.into(),
        })
    }

    /// Read `CF_ACCOUNT_ID` and `CF_API_TOKEN` from the environment.
    pub fn from_env(base_url: Option<&str>, timeout_secs: u64) -> Result<Self> {
        let account_id = required_env("CF_ACCOUNT_ID")?;
        let api_token = required_env("CF_API_TOKEN")?;
        Self::new(base_url, account_id, api_token, timeout_secs)
    }

    /// Full run URL for `model`.
    pub fn model_url(&self, model: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid Workers AI base URL: {}", self.base_url))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| anyhow::anyhow!("Workers AI base URL cannot be a base: {}", self.base_url))?;
            segments
                .pop_if_empty()
                .extend(["accounts", self.account_id.as_str(), "ai", "run"])
                .extend(model.split('/'));
        }
        Ok(url)
    }

    /// Run `model` with `input` and return the `result` field of the envelope.
    pub async fn run(&self, model: &str, input: &serde_json::Value) -> Result<serde_json::Value> {
        let url = self.model_url(model)?;
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_token)
            .json(input)
            .send()
            .await
            .context("Cloudflare Workers AI request failed")?;

        let status = response.status();
        let json: serde_json::Value = response
            .json()
            .await
            .with_context(|| format!("Cloudflare Workers AI returned non-JSON body (status {})", status))?;

        let success = json.get("success").and_then(|s| s.as_bool());
        if !status.is_success() || success == Some(false) {
            let errors = json.get("errors").cloned().unwrap_or(serde_json::Value::Null);
            bail!(
                "Cloudflare Workers AI request failed: {}",
                preview(&serde_json::json!({ "status": status.as_u16(), "errors": errors }))
            );
        }

        match json.get("result") {
            Some(result) if !result.is_null() => Ok(result.clone()),
            _ => bail!("Cloudflare Workers AI response missing result"),
        }
    }
}

fn required_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => bail!("Missing required env var: {}", name),
    }
}
