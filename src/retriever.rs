//! Two-tier retrieval: vector search first, lexical keyword fallback second.
//!
//! 1. Embed the question and ask the [`VectorStore`] for the `top_k` nearest
//!    chunks with similarity ≥ `min_score`. Any rows → done; the lexical tier
//!    is never consulted.
//! 2. Only when the vector tier succeeds with zero rows, score every
//!    knowledge document by capped token frequency and return the best
//!    `top_k` as whole-document chunks (`chunk_id = 1`).
//!
//! Embedding and store errors propagate; only an empty successful vector
//! response triggers the fallback.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::embedding::EmbeddingsProvider;
use crate::knowledge::KnowledgeSource;
use crate::models::{KnowledgeDocument, RetrievalTier, RetrievedChunk};
use crate::store::VectorStore;
use crate::text::{clamp01, tokenize};

/// Per-token contribution cap in the lexical score.
pub const LEXICAL_TOKEN_CAP: usize = 3;
/// Lower bound of the lexical score denominator.
pub const LEXICAL_MIN_DENOMINATOR: usize = 8;

#[async_trait]
pub trait Retriever: Send + Sync {
    /// Return at most `top_k` chunks ordered by descending similarity.
    async fn retrieve(&self, question: &str) -> Result<Vec<RetrievedChunk>>;
}

#[derive(Debug, Clone, Copy)]
pub struct RetrieverConfig {
    pub top_k: usize,
    pub min_score: f64,
}

impl From<&crate::config::RetrievalConfig> for RetrieverConfig {
    fn from(cfg: &crate::config::RetrievalConfig) -> Self {
        Self {
            top_k: cfg.top_k,
            min_score: cfg.min_score,
        }
    }
}

pub struct RagRetriever {
    config: RetrieverConfig,
    embeddings: Arc<dyn EmbeddingsProvider>,
    store: Arc<dyn VectorStore>,
    knowledge: Arc<dyn KnowledgeSource>,
}

impl RagRetriever {
    pub fn new(
        config: RetrieverConfig,
        embeddings: Arc<dyn EmbeddingsProvider>,
        store: Arc<dyn VectorStore>,
        knowledge: Arc<dyn KnowledgeSource>,
    ) -> Self {
        Self {
            config,
            embeddings,
            store,
            knowledge,
        }
    }
}

#[async_trait]
impl Retriever for RagRetriever {
    async fn retrieve(&self, question: &str) -> Result<Vec<RetrievedChunk>> {
        let query_vec = self.embeddings.embed(question).await?;
        let rows = self
            .store
            .match_documents(&query_vec, self.config.top_k, self.config.min_score)
            .await?;

        if !rows.is_empty() {
            tracing::debug!(rows = rows.len(), "vector tier matched");
            return Ok(rows
                .into_iter()
                .map(|r| RetrievedChunk {
                    id: r.id,
                    title: r.title,
                    url: r.url,
                    chunk_id: r.chunk_id,
                    content: r.content,
                    similarity: clamp01(r.similarity),
                    source: RetrievalTier::Vector,
                })
                .collect());
        }

        tracing::warn!(
            min_score = self.config.min_score,
            "vector tier returned no rows, using lexical fallback"
        );
        let docs = self.knowledge.documents().await?;
        Ok(lexical_fallback(question, &docs, self.config.top_k))
    }
}

/// Capped-frequency keyword score of one document against a query token set.
///
/// `sum(min(3, freq(t)))` over unique query tokens, divided by
/// `max(8, 2 × |tokens|)` and clamped to `[0, 1]`. Zero for an empty set.
pub fn lexical_score(query_tokens: &BTreeSet<String>, document_text: &str) -> f64 {
    if query_tokens.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<String, usize> = HashMap::new();
    for token in tokenize(document_text) {
        *freq.entry(token).or_insert(0) += 1;
    }

    let hits: usize = query_tokens
        .iter()
        .map(|t| freq.get(t).copied().unwrap_or(0).min(LEXICAL_TOKEN_CAP))
        .sum();
    let denom = LEXICAL_MIN_DENOMINATOR.max(query_tokens.len() * 2);
    clamp01(hits as f64 / denom as f64)
}

/// Rank whole documents by [`lexical_score`] and emit the best `top_k` as
/// synthetic single chunks. Documents scoring zero are excluded.
pub fn lexical_fallback(
    question: &str,
    docs: &[KnowledgeDocument],
    top_k: usize,
) -> Vec<RetrievedChunk> {
    let query_tokens: BTreeSet<String> = tokenize(question).into_iter().collect();
    if query_tokens.is_empty() {
        return Vec::new();
    }

    let mut scored: Vec<(&KnowledgeDocument, f64)> = docs
        .iter()
        .map(|doc| (doc, lexical_score(&query_tokens, &doc.content)))
        .filter(|(_, score)| *score > 0.0)
        .collect();

    // Stable sort keeps source order for equal scores.
    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(top_k);

    scored
        .into_iter()
        .enumerate()
        .map(|(i, (doc, score))| RetrievedChunk {
            id: format!("lexical:{}:{}", doc.source, i + 1),
            title: doc.title.clone(),
            url: doc.url.clone(),
            chunk_id: 1,
            content: doc.content.clone(),
            similarity: score,
            source: RetrievalTier::Lexical,
        })
        .collect()
}
