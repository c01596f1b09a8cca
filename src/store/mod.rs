//! Vector store abstraction.
//!
//! The [`VectorStore`] trait is the only view of the chunk index the
//! retriever and the ingest workflow have, so backends are interchangeable:
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`SqliteVectorStore`] | Persistent store used by the CLI and server |
//! | [`InMemoryVectorStore`] | Tests and ephemeral runs |
//!
//! Both backends share [`rank_matches`], so similarity filtering, ordering,
//! and clamping are identical.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::models::{ChunkRecord, MatchRow};
use crate::text::clamp01;

pub use memory::InMemoryVectorStore;
pub use sqlite::SqliteVectorStore;

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Return up to `match_count` rows whose cosine similarity to `query_vec`
    /// is at least `min_score`, best first. An empty result is not an error.
    async fn match_documents(
        &self,
        query_vec: &[f32],
        match_count: usize,
        min_score: f64,
    ) -> Result<Vec<MatchRow>>;

    /// Insert or replace the row for `(record.source, record.chunk_id)`.
    async fn upsert_chunk(&self, record: &ChunkRecord) -> Result<()>;

    /// Fingerprint of the stored row for `(source, chunk_id)`, if any.
    async fn chunk_fingerprint(&self, source: &str, chunk_id: i64) -> Result<Option<ChunkFingerprint>>;

    /// Delete rows of `source` with `chunk_id > keep`. Returns rows removed.
    async fn prune_source(&self, source: &str, keep: i64) -> Result<u64>;

    /// Total number of stored chunks.
    async fn count(&self) -> Result<i64>;
}

/// What ingest compares to decide whether a chunk needs re-embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFingerprint {
    pub content_hash: String,
    pub dims: usize,
}

/// SHA-256 hex digest over the fields a stored row is built from.
pub fn content_hash(title: &str, url: Option<&str>, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update([0u8]);
    hasher.update(url.unwrap_or_default().as_bytes());
    hasher.update([0u8]);
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Result of [`smoke_check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreHealth {
    pub rows: i64,
    pub probe_matches: usize,
}

/// Confirm the store answers `count` and a zero-vector `match_documents`
/// with `min_score = 0`.
pub async fn smoke_check(store: &dyn VectorStore, dims: usize, probe_count: usize) -> Result<StoreHealth> {
    let rows = store.count().await?;
    let probe = vec![0.0f32; dims];
    let matches = store.match_documents(&probe, probe_count, 0.0).await?;
    Ok(StoreHealth {
        rows,
        probe_matches: matches.len(),
    })
}

/// Filter by `min_score`, sort by similarity (desc) then id (asc), truncate,
/// and clamp reported similarity to `[0.0, 1.0]`.
///
/// Callers pass raw cosine similarity in `similarity`.
pub fn rank_matches(mut rows: Vec<MatchRow>, match_count: usize, min_score: f64) -> Vec<MatchRow> {
    rows.retain(|r| r.similarity.is_finite() && r.similarity >= min_score);
    rows.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    rows.truncate(match_count);
    for r in &mut rows {
        r.similarity = clamp01(r.similarity);
    }
    rows
}
