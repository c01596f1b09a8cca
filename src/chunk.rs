//! Paragraph-boundary text chunker with tail overlap.
//!
//! Splits a document on blank lines, normalizes whitespace inside each
//! paragraph, and greedily packs paragraphs into windows of at most
//! `max_chars` characters. When a window is flushed, its last
//! `overlap_chars` characters seed the next window so adjacent chunks share
//! context.
//!
//! A paragraph that is longer than `max_chars` on its own is emitted whole;
//! this function never cuts inside a paragraph.

use regex::Regex;
use std::sync::LazyLock;

use crate::models::Chunk;
use crate::text::{normalize_whitespace, tail_chars};

pub const DEFAULT_MAX_CHARS: usize = 900;
pub const DEFAULT_OVERLAP_CHARS: usize = 120;

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{2,}").expect("valid regex"));

/// Split text into overlapping chunks on paragraph boundaries.
/// Returns chunks with contiguous ids starting at 1. Empty or
/// whitespace-only input yields no chunks.
pub fn chunk_text(text: &str, max_chars: usize, overlap_chars: usize) -> Vec<Chunk> {
    let paragraphs = PARAGRAPH_BREAK
        .split(text)
        .map(normalize_whitespace)
        .filter(|p| !p.is_empty());

    let mut windows: Vec<String> = Vec::new();
    let mut buf = String::new();

    for para in paragraphs {
        if buf.is_empty() {
            buf = para;
            continue;
        }

        // +2 for the "\n\n" separator
        let would_be = buf.chars().count() + 2 + para.chars().count();
        if would_be <= max_chars {
            buf.push_str("\n\n");
            buf.push_str(&para);
        } else {
            let tail = tail_chars(&buf, overlap_chars).to_string();
            windows.push(std::mem::take(&mut buf));
            buf = normalize_whitespace(&format!("{}\n\n{}", tail, para));
        }
    }

    if !buf.is_empty() {
        windows.push(buf);
    }

    windows
        .into_iter()
        .enumerate()
        .map(|(i, content)| Chunk {
            chunk_id: i as i64 + 1,
            content,
        })
        .collect()
}

/// [`chunk_text`] with the default window (900) and overlap (120).
pub fn chunk_default(text: &str) -> Vec<Chunk> {
    chunk_text(text, DEFAULT_MAX_CHARS, DEFAULT_OVERLAP_CHARS)
}
