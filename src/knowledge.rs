//! Knowledge-base documents: discovery, title and reference-URL extraction.
//!
//! The [`KnowledgeSource`] trait is the seam the lexical fallback and the
//! ingest workflow read documents through. [`FsKnowledgeSource`] walks a
//! directory of markdown files, applying include globs the same way for both.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use walkdir::WalkDir;

use crate::config::KnowledgeConfig;
use crate::models::KnowledgeDocument;

static TITLE_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#[ \t]+(.+?)[ \t]*\r?$").expect("valid regex"));

/// Ordered URL rules: an explicit "References:" bullet, then the first
/// Apple Support link, then the first apple.com link.
static REFERENCE_URL_RULES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)References:\s*\n\s*(?:-|\*)\s*(https?://\S+)",
        r"(?i)(https?://support\.apple\.com/\S+)",
        r"(?i)(https?://www\.apple\.com/\S+)",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// Extract the first top-level (`# `) heading, trimmed.
pub fn extract_title(markdown: &str) -> Option<String> {
    TITLE_HEADING
        .captures(markdown)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Extract a best-effort reference URL from a document body.
pub fn extract_reference_url(markdown: &str) -> Option<String> {
    REFERENCE_URL_RULES.iter().find_map(|re| {
        re.captures(markdown)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    })
}

/// Title for display: the document heading, else the file name without `.md`.
pub fn title_or_file_name(markdown: &str, file_name: &str) -> String {
    extract_title(markdown).unwrap_or_else(|| strip_md_extension(file_name).to_string())
}

fn strip_md_extension(file_name: &str) -> &str {
    let lower = file_name.to_ascii_lowercase();
    if lower.ends_with(".md") {
        &file_name[..file_name.len() - 3]
    } else {
        file_name
    }
}

/// Build a [`KnowledgeDocument`] from raw markdown.
pub fn build_document(source: String, file_name: &str, content: String) -> KnowledgeDocument {
    KnowledgeDocument {
        title: title_or_file_name(&content, file_name),
        url: extract_reference_url(&content),
        source,
        content,
    }
}

/// Enumerable collection of knowledge documents.
#[async_trait]
pub trait KnowledgeSource: Send + Sync {
    /// Read every document. Order is deterministic (sorted by `source`).
    async fn documents(&self) -> Result<Vec<KnowledgeDocument>>;
}

/// Markdown files under a directory.
pub struct FsKnowledgeSource {
    root: PathBuf,
    include: GlobSet,
    source_prefix: String,
}

impl FsKnowledgeSource {
    pub fn new(config: &KnowledgeConfig) -> Result<Self> {
        Ok(Self {
            root: config.dir.clone(),
            include: build_globset(&config.include_globs)?,
            source_prefix: config.source_prefix.clone(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn source_label(&self, relative: &str) -> String {
        if self.source_prefix.is_empty() {
            relative.to_string()
        } else {
            format!("{}/{}", self.source_prefix, relative)
        }
    }

    fn scan(&self) -> Result<Vec<KnowledgeDocument>> {
        if !self.root.exists() {
            bail!("Knowledge directory does not exist: {}", self.root.display());
        }

        let mut docs = Vec::new();
        for entry in WalkDir::new(&self.root) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            let rel_str = relative.to_string_lossy().replace('\\', "/");
            if !self.include.is_match(&rel_str) {
                continue;
            }

            let content = match std::fs::read_to_string(path) {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable knowledge file");
                    continue;
                }
            };
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| rel_str.clone());

            docs.push(build_document(self.source_label(&rel_str), &file_name, content));
        }

        // Sort for deterministic ordering
        docs.sort_by(|a, b| a.source.cmp(&b.source));
        Ok(docs)
    }
}

#[async_trait]
impl KnowledgeSource for FsKnowledgeSource {
    async fn documents(&self) -> Result<Vec<KnowledgeDocument>> {
        self.scan()
            .with_context(|| format!("Failed to read knowledge base at {}", self.root.display()))
    }
}

/// Fixed in-memory documents, for tests and embedding the assistant.
pub struct StaticKnowledgeSource {
    docs: Vec<KnowledgeDocument>,
}

impl StaticKnowledgeSource {
    pub fn new(docs: Vec<KnowledgeDocument>) -> Self {
        Self { docs }
    }
}

#[async_trait]
impl KnowledgeSource for StaticKnowledgeSource {
    async fn documents(&self) -> Result<Vec<KnowledgeDocument>> {
        Ok(self.docs.clone())
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
