//! SQLite-backed [`VectorStore`].
//!
//! Embeddings are stored as little-endian `f32` BLOBs next to the chunk
//! text. Similarity is computed in process over every row, which is plenty
//! for a knowledge base measured in hundreds of chunks.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use std::path::Path;
use uuid::Uuid;

use crate::db;
use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::migrate;
use crate::models::{ChunkRecord, MatchRow};

use super::{content_hash, rank_matches, ChunkFingerprint, VectorStore};

pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    /// Open (creating if missing) the database at `path` and apply the schema.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect(path).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn match_documents(
        &self,
        query_vec: &[f32],
        match_count: usize,
        min_score: f64,
    ) -> Result<Vec<MatchRow>> {
        // Fetch all vectors and compute cosine similarity in Rust
        let rows = sqlx::query("SELECT id, title, url, chunk_id, content, embedding FROM documents")
            .fetch_all(&self.pool)
            .await
            .context("match_documents query failed")?;

        let candidates: Vec<MatchRow> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vector = blob_to_vec(&blob);
                MatchRow {
                    id: row.get("id"),
                    title: row.get("title"),
                    url: row.get("url"),
                    chunk_id: row.get("chunk_id"),
                    content: row.get("content"),
                    similarity: cosine_similarity(query_vec, &vector) as f64,
                }
            })
            .collect();

        Ok(rank_matches(candidates, match_count, min_score))
    }

    async fn upsert_chunk(&self, record: &ChunkRecord) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO documents (id, source, title, url, chunk_id, content, content_hash, embedding, dims, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(source, chunk_id) DO UPDATE SET
                title = excluded.title,
                url = excluded.url,
                content = excluded.content,
                content_hash = excluded.content_hash,
                embedding = excluded.embedding,
                dims = excluded.dims,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&record.source)
        .bind(&record.title)
        .bind(&record.url)
        .bind(record.chunk_id)
        .bind(&record.content)
        .bind(content_hash(&record.title, record.url.as_deref(), &record.content))
        .bind(vec_to_blob(&record.embedding))
        .bind(record.embedding.len() as i64)
        .bind(now)
        .execute(&self.pool)
        .await
        .with_context(|| {
            format!(
                "Upsert failed for {} chunk {}",
                record.source, record.chunk_id
            )
        })?;
        Ok(())
    }

    async fn chunk_fingerprint(&self, source: &str, chunk_id: i64) -> Result<Option<ChunkFingerprint>> {
        let row = sqlx::query("SELECT content_hash, dims FROM documents WHERE source = ? AND chunk_id = ?")
            .bind(source)
            .bind(chunk_id)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Fingerprint lookup failed for {} chunk {}", source, chunk_id))?;

        Ok(row.map(|row| ChunkFingerprint {
            content_hash: row.get("content_hash"),
            dims: row.get::<i64, _>("dims") as usize,
        }))
    }

    async fn prune_source(&self, source: &str, keep: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM documents WHERE source = ? AND chunk_id > ?")
            .bind(source)
            .bind(keep)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn count(&self) -> Result<i64> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await
            .context("documents table not reachable")?;
        Ok(n)
    }
}
