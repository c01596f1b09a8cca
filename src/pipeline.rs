//! Question-answering orchestrator.
//!
//! One call to [`Pipeline::answer`] walks the request through
//! `classify → retrieve → prompt → generate → shape`. Guardrail verdicts and
//! empty retrieval end the request early with an uncited [`Answer`];
//! collaborator failures abort it with an [`AnswerError`].
//!
//! The pipeline holds no per-request mutable state, so a single instance is
//! shared (`Arc<Pipeline>`) across concurrent requests.

use anyhow::Result;
use std::sync::Arc;

use crate::chat::{create_chat_provider, ChatMessage, ChatProvider, GenerateRequest};
use crate::config::Config;
use crate::embedding::create_provider;
use crate::error::AnswerError;
use crate::guardrail::{GuardrailPolicy, GuardrailVerdict};
use crate::knowledge::FsKnowledgeSource;
use crate::models::{Answer, Source};
use crate::prompt::{build_system_prompt, build_user_prompt};
use crate::retriever::{RagRetriever, Retriever, RetrieverConfig};
use crate::store::SqliteVectorStore;

/// Returned (with no sources) when retrieval finds nothing.
pub const NO_RELEVANT_INFO: &str = "I'm not finding any relevant AirTag info in the current knowledge base. Try rephrasing, or check Apple Support for the latest details.\n\nSources:\n- (no sources found)";

pub const ANSWER_TEMPERATURE: f32 = 0.2;
pub const ANSWER_MAX_TOKENS: u32 = 700;

pub struct Pipeline {
    retriever: Arc<dyn Retriever>,
    chat: Arc<dyn ChatProvider>,
    policy: GuardrailPolicy,
}

impl Pipeline {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        chat: Arc<dyn ChatProvider>,
        policy: GuardrailPolicy,
    ) -> Self {
        Self {
            retriever,
            chat,
            policy,
        }
    }

    /// Wire the configured providers, the SQLite store, and the filesystem
    /// knowledge source into a pipeline.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let embeddings = create_provider(&config.embedding)?;
        let chat = create_chat_provider(&config.chat)?;
        let store = Arc::new(SqliteVectorStore::open(&config.store.path).await?);
        let knowledge = Arc::new(FsKnowledgeSource::new(&config.knowledge)?);

        let retriever = RagRetriever::new(
            RetrieverConfig::from(&config.retrieval),
            embeddings,
            store,
            knowledge,
        );
        let policy = match &config.guardrails.consent_phrases {
            Some(phrases) => GuardrailPolicy::with_consent_phrases(phrases),
            None => GuardrailPolicy::default(),
        };

        Ok(Self::new(Arc::new(retriever), chat, policy))
    }

    pub async fn answer(&self, question: &str) -> Result<Answer, AnswerError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AnswerError::EmptyQuestion);
        }

        match self.policy.classify(question) {
            GuardrailVerdict::SmallTalk(kind) => {
                tracing::debug!(?kind, "answered as small talk");
                return Ok(Answer::uncited(kind.reply()));
            }
            GuardrailVerdict::Unsafe(message) => {
                tracing::debug!("refused: unsafe request");
                return Ok(Answer::uncited(message));
            }
            GuardrailVerdict::OutOfScope(message) => {
                tracing::debug!("redirected: out of scope");
                return Ok(Answer::uncited(message));
            }
            GuardrailVerdict::InScope => {}
        }

        let chunks = self
            .retriever
            .retrieve(question)
            .await
            .map_err(AnswerError::Retrieval)?;
        if chunks.is_empty() {
            tracing::debug!("no chunks retrieved");
            return Ok(Answer::uncited(NO_RELEVANT_INFO));
        }
        tracing::debug!(
            chunks = chunks.len(),
            tier = %chunks[0].source,
            "retrieved context"
        );

        let request = GenerateRequest {
            messages: vec![
                ChatMessage::system(build_system_prompt()),
                ChatMessage::user(build_user_prompt(question, &chunks)),
            ],
            temperature: Some(ANSWER_TEMPERATURE),
            max_tokens: Some(ANSWER_MAX_TOKENS),
        };
        let answer = self
            .chat
            .generate(&request)
            .await
            .map_err(AnswerError::Generation)?;

        // Sources are exactly the chunks placed in the prompt.
        let sources = chunks.iter().map(Source::from).collect();
        Ok(Answer { answer, sources })
    }
}
