//! Ingest workflow: knowledge documents → chunks → embeddings → store.
//!
//! Each document is chunked with the configured sizes, every changed chunk
//! is embedded and upserted under `(source, chunk_id)`, and chunk ids beyond
//! the new chunk count are pruned so a shortened document leaves no stale
//! tail. A chunk whose stored hash and dims already match is skipped
//! without an embedding call. Embedding and store failures abort the run.

use anyhow::{bail, Context, Result};

use crate::chunk::chunk_text;
use crate::config::{ChunkingConfig, Config};
use crate::embedding::{create_provider, EmbeddingsProvider};
use crate::knowledge::{FsKnowledgeSource, KnowledgeSource};
use crate::models::ChunkRecord;
use crate::store::{content_hash, SqliteVectorStore, VectorStore};

const PROGRESS_EVERY: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub documents: usize,
    pub chunks: usize,
    pub skipped: usize,
    pub pruned: u64,
}

pub async fn ingest_documents(
    knowledge: &dyn KnowledgeSource,
    embeddings: &dyn EmbeddingsProvider,
    store: &dyn VectorStore,
    chunking: &ChunkingConfig,
) -> Result<IngestReport> {
    let docs = knowledge.documents().await?;
    if docs.is_empty() {
        bail!("No knowledge documents found to ingest");
    }

    let mut report = IngestReport {
        documents: docs.len(),
        ..Default::default()
    };

    for doc in &docs {
        let chunks = chunk_text(&doc.content, chunking.max_chars, chunking.overlap_chars);
        tracing::debug!(source = %doc.source, chunks = chunks.len(), "chunked document");

        for chunk in &chunks {
            let hash = content_hash(&doc.title, doc.url.as_deref(), &chunk.content);
            let unchanged = store
                .chunk_fingerprint(&doc.source, chunk.chunk_id)
                .await?
                .is_some_and(|fp| fp.content_hash == hash && fp.dims == embeddings.dims());
            if unchanged {
                report.skipped += 1;
                continue;
            }

            let embedding = embeddings
                .embed(&chunk.content)
                .await
                .with_context(|| format!("Embedding failed for {} chunk {}", doc.source, chunk.chunk_id))?;

            store
                .upsert_chunk(&ChunkRecord {
                    source: doc.source.clone(),
                    title: doc.title.clone(),
                    url: doc.url.clone(),
                    chunk_id: chunk.chunk_id,
                    content: chunk.content.clone(),
                    embedding,
                })
                .await?;

            report.chunks += 1;
            if report.chunks % PROGRESS_EVERY == 0 {
                tracing::info!(chunks = report.chunks, "ingest progress");
            }
        }

        report.pruned += store
            .prune_source(&doc.source, chunks.len() as i64)
            .await
            .with_context(|| format!("Prune failed for {}", doc.source))?;
    }

    tracing::info!(
        documents = report.documents,
        chunks = report.chunks,
        skipped = report.skipped,
        pruned = report.pruned,
        "ingest complete"
    );
    Ok(report)
}

/// `airtag ingest`: read the configured knowledge dir into the SQLite store.
pub async fn run_ingest(config: &Config) -> Result<()> {
    if !config.embedding.is_enabled() {
        bail!("Embedding provider is disabled. Set [embedding] provider in config to ingest.");
    }

    let knowledge = FsKnowledgeSource::new(&config.knowledge)?;
    let embeddings = create_provider(&config.embedding)?;
    let store = SqliteVectorStore::open(&config.store.path).await?;

    let report = ingest_documents(&knowledge, embeddings.as_ref(), &store, &config.chunking).await;
    store.close().await;
    let report = report?;

    println!("ingest {}", knowledge.root().display());
    println!("  documents: {}", report.documents);
    println!("  chunks upserted: {}", report.chunks);
    println!("  unchanged chunks skipped: {}", report.skipped);
    println!("  stale chunks pruned: {}", report.pruned);
    println!("ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::{build_document, StaticKnowledgeSource};
    use crate::store::InMemoryVectorStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingEmbedder {
        calls: AtomicUsize,
        fail_on: Option<usize>,
    }

    impl CountingEmbedder {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail_on: None,
            }
        }
    }

    #[async_trait]
    impl EmbeddingsProvider for CountingEmbedder {
        fn model_name(&self) -> &str {
            "counting"
        }
        fn dims(&self) -> usize {
            2
        }
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail_on == Some(n) {
                bail!("rate limited");
            }
            Ok(vec![1.0, text.len() as f32])
        }
    }

    fn chunking(max_chars: usize) -> ChunkingConfig {
        ChunkingConfig {
            max_chars,
            overlap_chars: 0,
        }
    }

    fn doc(name: &str, content: &str) -> crate::models::KnowledgeDocument {
        build_document(format!("airtags/{}", name), name, content.to_string())
    }

    #[tokio::test]
    async fn test_ingest_counts_and_upserts() {
        let source = StaticKnowledgeSource::new(vec![
            doc("a.md", "# A\n\nfirst paragraph\n\nsecond paragraph"),
            doc("b.md", "# B\n\nshort"),
        ]);
        let embedder = CountingEmbedder::new();
        let store = InMemoryVectorStore::new();

        let report = ingest_documents(&source, &embedder, &store, &chunking(20))
            .await
            .unwrap();
        assert_eq!(report.documents, 2);
        assert_eq!(report.chunks, store.count().await.unwrap() as usize);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), report.chunks);
        assert_eq!(report.pruned, 0);
    }

    #[tokio::test]
    async fn test_reingest_prunes_stale_tail() {
        let store = InMemoryVectorStore::new();
        let embedder = CountingEmbedder::new();
        let long = StaticKnowledgeSource::new(vec![doc("a.md", "one one one\n\ntwo two two\n\nthree three")]);
        let first = ingest_documents(&long, &embedder, &store, &chunking(12))
            .await
            .unwrap();
        assert_eq!(first.chunks, 3);

        let short = StaticKnowledgeSource::new(vec![doc("a.md", "one one one")]);
        let second = ingest_documents(&short, &embedder, &store, &chunking(12))
            .await
            .unwrap();
        // Chunk 1 is unchanged, only the tail goes.
        assert_eq!(second.chunks, 0);
        assert_eq!(second.skipped, 1);
        assert_eq!(second.pruned, 2);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reingest_unchanged_skips_embedding() {
        let store = InMemoryVectorStore::new();
        let embedder = CountingEmbedder::new();
        let source = StaticKnowledgeSource::new(vec![
            doc("a.md", "# A\n\nfirst paragraph\n\nsecond paragraph"),
            doc("b.md", "# B\n\nshort"),
        ]);
        let first = ingest_documents(&source, &embedder, &store, &chunking(20))
            .await
            .unwrap();
        let calls = embedder.calls.load(Ordering::SeqCst);

        let again = ingest_documents(&source, &embedder, &store, &chunking(20))
            .await
            .unwrap();
        assert_eq!(embedder.calls.load(Ordering::SeqCst), calls);
        assert_eq!(again.chunks, 0);
        assert_eq!(again.skipped, first.chunks);
        assert_eq!(store.count().await.unwrap() as usize, first.chunks);
    }

    #[tokio::test]
    async fn test_reingest_reembeds_edited_chunk_only() {
        let store = InMemoryVectorStore::new();
        let embedder = CountingEmbedder::new();
        let before = StaticKnowledgeSource::new(vec![doc("a.md", "alpha alpha\n\nbeta beta")]);
        ingest_documents(&before, &embedder, &store, &chunking(12))
            .await
            .unwrap();
        let calls = embedder.calls.load(Ordering::SeqCst);

        let after = StaticKnowledgeSource::new(vec![doc("a.md", "alpha alpha\n\ngamma gamma")]);
        let report = ingest_documents(&after, &embedder, &store, &chunking(12))
            .await
            .unwrap();
        assert_eq!(report.chunks, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), calls + 1);
    }

    #[tokio::test]
    async fn test_empty_knowledge_base_is_error() {
        let err = ingest_documents(
            &StaticKnowledgeSource::new(vec![]),
            &CountingEmbedder::new(),
            &InMemoryVectorStore::new(),
            &chunking(900),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("No knowledge documents"));
    }

    #[tokio::test]
    async fn test_embedding_failure_names_chunk() {
        let embedder = CountingEmbedder {
            calls: AtomicUsize::new(0),
            fail_on: Some(2),
        };
        let source = StaticKnowledgeSource::new(vec![doc("a.md", "alpha alpha\n\nbeta beta")]);
        let err = ingest_documents(&source, &embedder, &InMemoryVectorStore::new(), &chunking(12))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("airtags/a.md chunk 2"));
    }
}
