//! Text normalization and scoring helpers.
//!
//! [`tokenize`] is the single tokenizer used by the guardrail classifier and
//! the lexical fallback; scoring across call sites depends on it staying the
//! same function.

use regex::Regex;
use std::sync::LazyLock;

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static NON_TOKEN_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9\s-]").expect("valid regex"));

/// Collapse every whitespace run to a single space and trim both ends.
pub fn normalize_whitespace(s: &str) -> String {
    WHITESPACE_RUN.replace_all(s, " ").trim().to_string()
}

/// Lower-case, replace everything except ASCII letters, digits, hyphen and
/// whitespace with a space, then split into non-empty tokens.
pub fn tokenize(s: &str) -> Vec<String> {
    let lowered = normalize_whitespace(&s.to_lowercase());
    NON_TOKEN_CHARS
        .replace_all(&lowered, " ")
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Truncate `s` to at most `max` characters, appending `…` when cut.
pub fn safe_slice(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((byte_idx, _)) => format!("{}…", &s[..byte_idx]),
        None => s.to_string(),
    }
}

/// Take the last `n` characters of `s` (char-boundary safe).
pub fn tail_chars(s: &str, n: usize) -> &str {
    let total = s.chars().count();
    if total <= n {
        return s;
    }
    match s.char_indices().nth(total - n) {
        Some((byte_idx, _)) => &s[byte_idx..],
        None => "",
    }
}

/// Clamp to `[0.0, 1.0]`; non-finite input maps to `0.0`.
pub fn clamp01(x: f64) -> f64 {
    if !x.is_finite() {
        return 0.0;
    }
    x.clamp(0.0, 1.0)
}
