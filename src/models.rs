//! Core data models used throughout the assistant.
//!
//! These types represent the chunks, retrieval results, and answers that flow
//! through the ingest and question-answering pipeline.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One window of a chunked document. `chunk_id` is 1-based and contiguous
/// within a single chunking run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub chunk_id: i64,
    pub content: String,
}

/// Which retrieval tier produced a [`RetrievedChunk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalTier {
    Vector,
    Lexical,
}

impl fmt::Display for RetrievalTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetrievalTier::Vector => write!(f, "vector"),
            RetrievalTier::Lexical => write!(f, "lexical"),
        }
    }
}

/// A chunk returned by the retriever for a single question.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    /// Unique within one retrieval call.
    pub id: String,
    pub title: String,
    pub url: Option<String>,
    pub chunk_id: i64,
    pub content: String,
    /// Relevance in `[0.0, 1.0]`.
    pub similarity: f64,
    pub source: RetrievalTier,
}

/// A citation returned to the caller, projected from a [`RetrievedChunk`]
/// that was shown to the generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub chunk_id: i64,
    pub score: f64,
}

impl From<&RetrievedChunk> for Source {
    fn from(chunk: &RetrievedChunk) -> Self {
        Self {
            title: chunk.title.clone(),
            url: chunk.url.clone(),
            chunk_id: chunk.chunk_id,
            score: chunk.similarity,
        }
    }
}

/// Terminal result of one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub sources: Vec<Source>,
}

impl Answer {
    /// An answer that cites nothing (small talk, refusals, empty retrieval).
    pub fn uncited(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            sources: Vec::new(),
        }
    }
}

/// A knowledge-base document as read at ingest time (or by the lexical fallback).
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeDocument {
    /// Stable identifier, e.g. `airtags/setup.md`.
    pub source: String,
    pub title: String,
    pub url: Option<String>,
    pub content: String,
}

/// A row returned by [`VectorStore::match_documents`](crate::store::VectorStore::match_documents).
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRow {
    pub id: String,
    pub title: String,
    pub url: Option<String>,
    pub chunk_id: i64,
    pub content: String,
    pub similarity: f64,
}

/// A chunk row written by the ingest workflow.
#[derive(Debug, Clone)]
pub struct ChunkRecord {
    pub source: String,
    pub title: String,
    pub url: Option<String>,
    pub chunk_id: i64,
    pub content: String,
    pub embedding: Vec<f32>,
}
