//! In-memory [`VectorStore`] implementation for testing and ephemeral runs.
//!
//! Uses a `Vec` behind `std::sync::RwLock` for thread safety.
//! Vector search is brute-force cosine similarity over all stored vectors.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{ChunkRecord, MatchRow};

use super::{content_hash, rank_matches, ChunkFingerprint, VectorStore};

struct StoredChunk {
    id: String,
    record: ChunkRecord,
}

/// In-memory store for tests and ephemeral environments.
pub struct InMemoryVectorStore {
    rows: RwLock<Vec<StoredChunk>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
        }
    }

    /// Build a store pre-populated with `records`.
    pub fn with_records(records: impl IntoIterator<Item = ChunkRecord>) -> Self {
        let store = Self::new();
        if let Ok(mut rows) = store.rows.write() {
            for record in records {
                upsert_locked(&mut rows, record);
            }
        }
        store
    }
}

impl Default for InMemoryVectorStore {
    fn default() -> Self {
        Self::new()
    }
}

fn lock_poisoned() -> anyhow::Error {
    anyhow::anyhow!("in-memory vector store lock poisoned")
}

fn upsert_locked(rows: &mut Vec<StoredChunk>, record: ChunkRecord) {
    match rows
        .iter_mut()
        .find(|r| r.record.source == record.source && r.record.chunk_id == record.chunk_id)
    {
        Some(existing) => existing.record = record,
        None => rows.push(StoredChunk {
            id: uuid::Uuid::new_v4().to_string(),
            record,
        }),
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn match_documents(
        &self,
        query_vec: &[f32],
        match_count: usize,
        min_score: f64,
    ) -> Result<Vec<MatchRow>> {
        let rows = self.rows.read().map_err(|_| lock_poisoned())?;
        let candidates: Vec<MatchRow> = rows
            .iter()
            .map(|sc| MatchRow {
                id: sc.id.clone(),
                title: sc.record.title.clone(),
                url: sc.record.url.clone(),
                chunk_id: sc.record.chunk_id,
                content: sc.record.content.clone(),
                similarity: cosine_similarity(query_vec, &sc.record.embedding) as f64,
            })
            .collect();
        Ok(rank_matches(candidates, match_count, min_score))
    }

    async fn upsert_chunk(&self, record: &ChunkRecord) -> Result<()> {
        let mut rows = self.rows.write().map_err(|_| lock_poisoned())?;
        upsert_locked(&mut rows, record.clone());
        Ok(())
    }

    async fn chunk_fingerprint(&self, source: &str, chunk_id: i64) -> Result<Option<ChunkFingerprint>> {
        let rows = self.rows.read().map_err(|_| lock_poisoned())?;
        Ok(rows
            .iter()
            .find(|r| r.record.source == source && r.record.chunk_id == chunk_id)
            .map(|r| ChunkFingerprint {
                content_hash: content_hash(&r.record.title, r.record.url.as_deref(), &r.record.content),
                dims: r.record.embedding.len(),
            }))
    }

    async fn prune_source(&self, source: &str, keep: i64) -> Result<u64> {
        let mut rows = self.rows.write().map_err(|_| lock_poisoned())?;
        let before = rows.len();
        rows.retain(|r| !(r.record.source == source && r.record.chunk_id > keep));
        Ok((before - rows.len()) as u64)
    }

    async fn count(&self) -> Result<i64> {
        let rows = self.rows.read().map_err(|_| lock_poisoned())?;
        Ok(rows.len() as i64)
    }
}
