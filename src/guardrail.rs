//! Rule-based guardrail classifier.
//!
//! Decides, before any retrieval or generation, whether a question is small
//! talk, an unsafe covert-tracking request, out of the AirTag / Find My
//! domain, or answerable. Classification is pure and deterministic.
//!
//! # Evaluation order
//!
//! 1. Small talk (anchored regexes against the trimmed question).
//! 2. Unsafe: an unsafe term AND a consent-violation phrase.
//! 3. Out of scope: no domain token and no `"find my"` / `"air tag"` substring.
//! 4. In scope.
//!
//! Small talk runs first because greetings carry no domain tokens. Safety
//! runs before scope so an unsafe out-of-domain question is still refused on
//! safety grounds.

use regex::Regex;
use std::sync::LazyLock;

use crate::text::{normalize_whitespace, tokenize};

/// Conversational question kinds answered with a canned reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmallTalkKind {
    Greeting,
    Thanks,
    Identity,
    Help,
}

impl SmallTalkKind {
    /// The fixed reply for this kind.
    pub fn reply(self) -> &'static str {
        match self {
            SmallTalkKind::Greeting => {
                "Hi! I can help with Apple AirTags and Find My item tracking. Ask me about setup, Precision Finding, Lost Mode, battery replacement, or unwanted tracking alerts."
            }
            SmallTalkKind::Thanks => {
                "You're welcome! Let me know if you have any other questions about AirTags or Find My."
            }
            SmallTalkKind::Identity => {
                "I'm AirTag Assistant. I answer questions about Apple AirTags and Find My item tracking using a curated knowledge base, and I cite the documents I used."
            }
            SmallTalkKind::Help => {
                "Ask me anything about AirTags and Find My, for example: \"How do I set up an AirTag?\", \"How does Precision Finding work?\", or \"How do I put an item in Lost Mode?\""
            }
        }
    }
}

/// Outcome of classifying one question. Exactly one variant applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardrailVerdict {
    SmallTalk(SmallTalkKind),
    Unsafe(String),
    OutOfScope(String),
    InScope,
}

pub const SAFETY_REFUSAL: &str = "I can't help with stalking, covert tracking, or monitoring someone without consent. If you're concerned about your safety, consider contacting local authorities or a trusted support resource.";

pub const OUT_OF_SCOPE_REDIRECT: &str =
    "I can only answer questions about Apple AirTags and Find My item tracking.";

static SMALL_TALK_PATTERNS: LazyLock<Vec<(SmallTalkKind, Regex)>> = LazyLock::new(|| {
    [
        (
            SmallTalkKind::Greeting,
            r"(?i)^(hi|hello|hey|hiya|howdy|good (morning|afternoon|evening))( there)?[\s!.,?]*$",
        ),
        (
            SmallTalkKind::Thanks,
            r"(?i)^(thanks|thank you|thx|ty|cheers)( so much| a lot)?[\s!.,?]*$",
        ),
        (
            SmallTalkKind::Identity,
            r"(?i)^(who are you|what are you|what can you do)\s*\??$",
        ),
        (SmallTalkKind::Help, r"(?i)^(help|\?)[\s!.?]*$"),
    ]
    .into_iter()
    .map(|(kind, pattern)| (kind, Regex::new(pattern).expect("valid regex")))
    .collect()
});

const UNSAFE_TERMS: &[&str] = &[
    "stalk",
    "stalking",
    "spy",
    "surveil",
    "surveillance",
    "track",
    "tracking",
    "follow",
    "monitor",
    "locate",
    "locating",
    "without",
    "secret",
    "secretly",
    "hide",
    "hide it",
    "plant",
    "planting",
];

const DEFAULT_CONSENT_PHRASES: &[&str] = &["without consent", "without them knowing", "secretly"];

const DOMAIN_TOKENS: &[&str] = &[
    "airtag",
    "airtags",
    "find",
    "my",
    "findmy",
    "precision",
    "finding",
    "lost",
    "mode",
    "item",
    "tracker",
    "tracking",
    "apple",
];

const DOMAIN_PHRASES: &[&str] = &["find my", "air tag"];

/// Return the small-talk kind of `question`, if any.
pub fn classify_small_talk(question: &str) -> Option<SmallTalkKind> {
    let trimmed = question.trim();
    SMALL_TALK_PATTERNS
        .iter()
        .find(|(_, re)| re.is_match(trimmed))
        .map(|(kind, _)| *kind)
}

/// Tunable phrase tables for the unsafe check.
///
/// Unsafe terms overlap with ordinary Find My vocabulary ("track", "locate"),
/// so the consent-violation phrase list is the only disambiguator. It is a
/// heuristic and is exposed through `[guardrails] consent_phrases`.
#[derive(Debug, Clone)]
pub struct GuardrailPolicy {
    consent_phrases: Vec<String>,
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self {
            consent_phrases: DEFAULT_CONSENT_PHRASES
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }
}

impl GuardrailPolicy {
    /// Build a policy with a custom consent-violation phrase list. Phrases are
    /// matched case-insensitively against whitespace-normalized text.
    pub fn with_consent_phrases<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            consent_phrases: phrases
                .into_iter()
                .map(|p| normalize_whitespace(&p.as_ref().to_lowercase()))
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn consent_phrases(&self) -> &[String] {
        &self.consent_phrases
    }

    /// Classify a question. First match wins; see the module docs for order.
    pub fn classify(&self, question: &str) -> GuardrailVerdict {
        if let Some(kind) = classify_small_talk(question) {
            return GuardrailVerdict::SmallTalk(kind);
        }

        let lowered = normalize_whitespace(&question.to_lowercase());
        let tokens = tokenize(question);
        // Token-joined form so multi-word terms match across punctuation.
        let token_text = format!(" {} ", tokens.join(" "));

        if self.is_unsafe(&lowered, &token_text) {
            return GuardrailVerdict::Unsafe(SAFETY_REFUSAL.to_string());
        }

        let domain_hit = tokens.iter().any(|t| DOMAIN_TOKENS.contains(&t.as_str()))
            || DOMAIN_PHRASES.iter().any(|p| lowered.contains(p));
        if !domain_hit {
            return GuardrailVerdict::OutOfScope(OUT_OF_SCOPE_REDIRECT.to_string());
        }

        GuardrailVerdict::InScope
    }

    fn is_unsafe(&self, lowered: &str, token_text: &str) -> bool {
        let unsafe_hit = UNSAFE_TERMS
            .iter()
            .any(|term| token_text.contains(&format!(" {} ", term)));
        if !unsafe_hit {
            return false;
        }
        self.consent_phrases
            .iter()
            .any(|phrase| lowered.contains(phrase.as_str()) || token_text.contains(phrase.as_str()))
    }
}

/// Classify with the default policy.
pub fn classify(question: &str) -> GuardrailVerdict {
    GuardrailPolicy::default().classify(question)
}
