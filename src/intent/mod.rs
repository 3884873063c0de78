//! Regex-based social intent detection.
//!
//! Classifies a raw message as greeting/farewell/thanks/apology before any
//! model is called. When business vocabulary is present alongside the social
//! phrase, the match is reported as ambiguous (`Unknown`, confidence 0.49)
//! so the caller routes to the business pipeline instead of replying with a
//! pure courtesy. Pure function over input text, no side effects.

mod patterns;

pub use patterns::{BUSINESS_HINT_PATTERNS, BUSINESS_KEYWORDS, SOCIAL_SIGNALS};

/// Category of a detected social act.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocialCategory {
    /// Greeting.
    Greeting,
    /// Farewell.
    Farewell,
    /// Thanks.
    Thanks,
    /// Apology.
    Apology,
    /// Socially phrased but carries business vocabulary.
    Unknown,
}

/// A detected social intent with a confidence heuristic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SocialIntentMatch {
    /// The first matching category.
    pub category: SocialCategory,
    /// Confidence: 0.6 base + 0.1 per matched pattern, capped at 0.95.
    /// Ambiguous matches report 0.49.
    pub confidence: f32,
}

/// Minimum normalized similarity for a fuzzy business-keyword match.
const FUZZY_THRESHOLD: f64 = 0.85;

/// Detects a social intent in raw text.
///
/// Returns `None` when no social family matches at all.
#[must_use]
pub fn detect(text: &str) -> Option<SocialIntentMatch> {
    if text.trim().is_empty() {
        return None;
    }

    let mut first_category = None;
    let mut match_count = 0usize;
    for signal in SOCIAL_SIGNALS.iter() {
        if signal.pattern.is_match(text) {
            if first_category.is_none() {
                first_category = Some(signal.category);
            }
            match_count += 1;
        }
    }
    let category = first_category?;

    if has_business_hint(text) {
        return Some(SocialIntentMatch {
            category: SocialCategory::Unknown,
            confidence: 0.49,
        });
    }

    #[allow(clippy::cast_precision_loss)]
    let confidence = (0.6 + 0.1 * match_count as f32).min(0.95);
    Some(SocialIntentMatch {
        category,
        confidence,
    })
}

/// Checks whether the text carries business vocabulary, exactly or fuzzily.
#[must_use]
pub fn has_business_hint(text: &str) -> bool {
    if BUSINESS_HINT_PATTERNS.iter().any(|p| p.is_match(text)) {
        return true;
    }

    // Fuzzy pass: catch near-miss spellings of the keyword list
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() >= 4)
        .any(|word| {
            let word = word.to_lowercase();
            BUSINESS_KEYWORDS
                .iter()
                .any(|kw| fuzzy_keyword_match(&word, kw))
        })
}

/// Fuzzy keyword match: same first letter, length within ±1, and normalized
/// Damerau-Levenshtein similarity at or above the threshold. Transpositions
/// count as one edit so common typos ("teahcer") stay within range.
fn fuzzy_keyword_match(word: &str, keyword: &str) -> bool {
    let (Some(w0), Some(k0)) = (word.chars().next(), keyword.chars().next()) else {
        return false;
    };
    if w0 != k0 {
        return false;
    }
    if word.chars().count().abs_diff(keyword.chars().count()) > 1 {
        return false;
    }
    strsim::normalized_damerau_levenshtein(word, keyword) >= FUZZY_THRESHOLD
}
