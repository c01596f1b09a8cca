//! TOML configuration parsing and validation.
//!
//! Secrets never live in the file: providers read `OPENAI_API_KEY` or
//! `CF_ACCOUNT_ID` / `CF_API_TOKEN` from the environment. A few retrieval
//! knobs (`RAG_TOP_K`, `RAG_MIN_SCORE`, `EMBED_DIM`) may be overridden from the
//! environment after the file is parsed.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub knowledge: KnowledgeConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub guardrails: GuardrailsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KnowledgeConfig {
    #[serde(default = "default_knowledge_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default = "default_source_prefix")]
    pub source_prefix: String,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            dir: default_knowledge_dir(),
            include_globs: default_include_globs(),
            source_prefix: default_source_prefix(),
        }
    }
}

fn default_knowledge_dir() -> PathBuf {
    PathBuf::from("./data/airtags")
}
fn default_include_globs() -> Vec<String> {
    vec!["*.md".to_string()]
}
fn default_source_prefix() -> String {
    "airtags".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    crate::chunk::DEFAULT_MAX_CHARS
}
fn default_overlap_chars() -> usize {
    crate::chunk::DEFAULT_OVERLAP_CHARS
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_min_score")]
    pub min_score: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_score: default_min_score(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_min_score() -> f64 {
    0.2
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_dims")]
    pub dims: usize,
    /// Overrides the provider's default API base URL.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: default_dims(),
            base_url: None,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_dims() -> usize {
    384
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChatConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_chat_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_chat_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            base_url: None,
            max_retries: default_chat_max_retries(),
            timeout_secs: default_chat_timeout_secs(),
        }
    }
}

impl ChatConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_chat_max_retries() -> u32 {
    2
}
fn default_chat_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./data/assistant.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct GuardrailsConfig {
    /// Replaces the built-in consent-violation phrases when set.
    #[serde(default)]
    pub consent_phrases: Option<Vec<String>>,
}

/// Read, parse, apply environment overrides, and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let mut config = parse_config(&content)?;
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate(&config)?;
    Ok(config)
}

/// Parse TOML text into a [`Config`] without validation.
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse config file")
}

/// Apply `RAG_TOP_K`, `RAG_MIN_SCORE`, and `EMBED_DIM` overrides.
///
/// `lookup` abstracts the environment so tests can supply values directly.
/// Blank values are ignored; unparsable values are errors.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

    if let Some(raw) = get("RAG_TOP_K") {
        config.retrieval.top_k = raw
            .parse()
            .with_context(|| format!("Invalid int for env var RAG_TOP_K: {}", raw))?;
    }
    if let Some(raw) = get("RAG_MIN_SCORE") {
        let value: f64 = raw
            .parse()
            .with_context(|| format!("Invalid number for env var RAG_MIN_SCORE: {}", raw))?;
        if !value.is_finite() {
            anyhow::bail!("Invalid number for env var RAG_MIN_SCORE: {}", raw);
        }
        config.retrieval.min_score = value;
    }
    if let Some(raw) = get("EMBED_DIM") {
        config.embedding.dims = raw
            .parse()
            .with_context(|| format!("Invalid int for env var EMBED_DIM: {}", raw))?;
    }
    Ok(())
}

/// Validate invariants the rest of the crate relies on.
pub fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    if config.chunking.max_chars == 0 {
        anyhow::bail!("chunking.max_chars must be > 0");
    }
    if config.chunking.overlap_chars >= config.chunking.max_chars {
        anyhow::bail!("chunking.overlap_chars must be < chunking.max_chars");
    }

    // Validate retrieval
    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if !(0.0..=1.0).contains(&config.retrieval.min_score) {
        anyhow::bail!("retrieval.min_score must be in [0.0, 1.0]");
    }

    // Validate embedding
    if config.embedding.is_enabled() {
        if config.embedding.dims == 0 {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }
    check_provider_name("embedding", &config.embedding.provider)?;

    // Validate chat
    if config.chat.is_enabled() && config.chat.model.is_none() {
        anyhow::bail!(
            "chat.model must be specified when provider is '{}'",
            config.chat.provider
        );
    }
    check_provider_name("chat", &config.chat.provider)?;

    Ok(())
}

fn check_provider_name(section: &str, provider: &str) -> Result<()> {
    match provider {
        "disabled" | "openai" | "cloudflare" => Ok(()),
        other => anyhow::bail!(
            "Unknown {} provider: '{}'. Must be disabled, openai, or cloudflare.",
            section,
            other
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE: &str = r#"
[knowledge]
dir = "./kb"

[retrieval]
top_k = 3
min_score = 0.35

[embedding]
provider = "cloudflare"
model = "@cf/baai/bge-small-en-v1.5"
dims = 384

[chat]
provider = "openai"
model = "gpt-4o-mini"

[guardrails]
consent_phrases = ["without consent"]
"#;

    #[test]
    fn test_defaults_when_sections_missing() {
        let config = parse_config("").unwrap();
        assert_eq!(config.chunking.max_chars, 900);
        assert_eq!(config.chunking.overlap_chars, 120);
        assert_eq!(config.retrieval.top_k, 5);
        assert!((config.retrieval.min_score - 0.2).abs() < 1e-9);
        assert_eq!(config.embedding.dims, 384);
        assert!(!config.embedding.is_enabled());
        assert_eq!(config.server.bind, "127.0.0.1:3000");
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_parse_sample() {
        let config = parse_config(SAMPLE).unwrap();
        assert_eq!(config.knowledge.dir, PathBuf::from("./kb"));
        assert_eq!(config.knowledge.include_globs, vec!["*.md".to_string()]);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.embedding.provider, "cloudflare");
        assert_eq!(
            config.guardrails.consent_phrases,
            Some(vec!["without consent".to_string()])
        );
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = parse_config(SAMPLE).unwrap();
        let env: HashMap<&str, &str> =
            [("RAG_TOP_K", "8"), ("RAG_MIN_SCORE", " 0.5 "), ("EMBED_DIM", "")]
                .into_iter()
                .collect();
        apply_env_overrides(&mut config, |k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.retrieval.top_k, 8);
        assert!((config.retrieval.min_score - 0.5).abs() < 1e-9);
        assert_eq!(config.embedding.dims, 384);
    }

    #[test]
    fn test_env_override_invalid() {
        let mut config = Config::default();
        let err = apply_env_overrides(&mut config, |k| {
            (k == "RAG_TOP_K").then(|| "five".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("RAG_TOP_K"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.retrieval.min_score = 1.5;
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.chunking.overlap_chars = 900;
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.embedding.provider = "openai".to_string();
        assert!(validate(&config).is_err(), "model is required");

        let mut config = Config::default();
        config.chat.provider = "ollama".to_string();
        config.chat.model = Some("llama3".to_string());
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("Unknown chat provider"));
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
