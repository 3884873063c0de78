//! Deterministic post-processing of generator model output.
//!
//! An ordered chain of pure text transforms applied to every model reply.
//! Each transform is independently testable; `apply_chain` runs them in the
//! fixed order the pipeline depends on (later transforms assume earlier ones
//! already ran, e.g. sentence dedup runs after "!" normalization).
// Allow expect() on static regex patterns - these are guaranteed to compile
#![allow(clippy::expect_used)]

use regex::Regex;
use std::sync::LazyLock;

static CITATION_MARKERS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[\d+\]|【[^】]*】|\(source:[^)]*\)").expect("static regex: citation markers")
});

static SERVICE_LABELS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^(briefly|important|answer|note|summary|кратко|важно|ответ)\s*:\s*")
        .expect("static regex: service labels")
});

static NO_DATA_PHRASES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(the (provided )?documents? (do(es)? not|don't) (contain|mention)[^.!?]*|no (data|information) (is )?available[^.!?]*|информация отсутствует[^.!?]*)[.!?]?")
        .expect("static regex: no data phrases")
});

static GENERIC_TRAILING_CTA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(feel free to (reach out|contact us)|if you have any( more| other)? questions[^.!?]*|let (me|us) know if[^.!?]*|always happy to help[^.!?]*)[.!?]?\s*$")
        .expect("static regex: generic trailing cta")
});

/// Friendly replacement for dry "no data" phrasing.
const NO_DATA_REPLACEMENT: &str =
    "We'd rather check that detail with the team than guess, so our manager will confirm it for you";

/// Vocabulary normalization table: stray loanwords and transliterations
/// mapped to the canonical brand terms.
const VOCABULARY: &[(&str, &str)] = &[
    ("онлайн-школа BrightKids", "BrightKids online school"),
    ("BrightKids school", "BrightKids online school"),
    ("безкоштовний", "free"),
    ("заняття", "lesson"),
    ("пробный урок", "trial lesson"),
];

/// Abbreviations protected from being treated as sentence boundaries.
const ABBREVIATIONS: &[&str] = &["etc.", "e.g.", "i.e.", "т.д.", "т.п.", "руб.", "Mr.", "Mrs."];

/// Strips citation markers the model copied from the documents.
#[must_use]
pub fn strip_citations(text: &str) -> String {
    CITATION_MARKERS.replace_all(text, "").to_string()
}

/// Drops heading lines that merely echo one of the decomposed questions.
#[must_use]
pub fn drop_heading_echoes(text: &str, questions: &[String]) -> String {
    let normalized_questions: Vec<String> = questions.iter().map(|q| normalize_line(q)).collect();
    text.lines()
        .filter(|line| {
            let stripped = line.trim_start_matches('#').trim();
            if stripped.is_empty() {
                return true;
            }
            let is_heading = line.trim_start().starts_with('#')
                || (stripped.ends_with('?') && stripped.len() < 80);
            if !is_heading {
                return true;
            }
            !normalized_questions.contains(&normalize_line(stripped))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Replaces dry "no data in the documents" phrasing with a friendlier
/// sentence.
#[must_use]
pub fn humanize_no_data(text: &str) -> String {
    NO_DATA_PHRASES
        .replace_all(text, format!("{NO_DATA_REPLACEMENT}."))
        .to_string()
}

/// Strips service-label prefixes ("Briefly:", "Important:").
#[must_use]
pub fn strip_labels(text: &str) -> String {
    SERVICE_LABELS.replace_all(text, "").to_string()
}

/// Strips a generic trailing CTA the model added unprompted.
#[must_use]
pub fn strip_generic_trailing_cta(text: &str) -> String {
    GENERIC_TRAILING_CTA.replace(text.trim_end(), "").trim_end().to_string()
}

/// Maps stray loanwords back to the canonical vocabulary.
#[must_use]
pub fn normalize_vocabulary(text: &str) -> String {
    let mut out = text.to_string();
    for (from, to) in VOCABULARY {
        out = out.replace(from, to);
    }
    out
}

/// Trims a trailing incomplete sentence (the model ran out of tokens).
#[must_use]
pub fn trim_incomplete_tail(text: &str) -> String {
    let trimmed = text.trim_end();
    if trimmed.is_empty() || trimmed.ends_with(['.', '!', '?']) {
        return trimmed.to_string();
    }
    let protected = protect_abbreviations(trimmed);
    match protected.rfind(['.', '!', '?']) {
        Some(pos) => restore_abbreviations(&protected[..=pos]).trim_end().to_string(),
        // No complete sentence at all: keep the fragment rather than
        // returning nothing
        None => trimmed.to_string(),
    }
}

/// Strips spurious "00" digit artifacts while preserving real numbers
/// ("10:00", "1000", "100" stay intact).
#[must_use]
pub fn strip_double_zero_artifacts(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '0'
            && i + 1 < chars.len()
            && chars[i + 1] == '0'
            && (i == 0 || !chars[i - 1].is_ascii_digit() && chars[i - 1] != ':')
            && (i + 2 >= chars.len() || !chars[i + 2].is_ascii_digit())
        {
            // Standalone "00" token: skip it and one adjacent space
            i += 2;
            if i < chars.len() && chars[i] == ' ' && out.ends_with(' ') {
                i += 1;
            }
            continue;
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// Converts exclamation marks to periods; the persona voice is calm.
#[must_use]
pub fn exclamations_to_periods(text: &str) -> String {
    text.replace('!', ".")
}

/// Removes duplicate sentences, case/whitespace-insensitive, with
/// abbreviation protection so "etc." is not mistaken for a boundary.
#[must_use]
pub fn dedupe_sentences(text: &str) -> String {
    let protected = protect_abbreviations(text);
    let mut seen: Vec<String> = Vec::new();
    let mut out = String::with_capacity(text.len());

    let mut start = 0;
    let bytes: Vec<char> = protected.chars().collect();
    let mut i = 0;
    while i <= bytes.len() {
        let at_boundary = i == bytes.len() || matches!(bytes[i], '.' | '!' | '?');
        if at_boundary {
            let end = if i < bytes.len() { i + 1 } else { i };
            let sentence: String = bytes[start..end].iter().collect();
            let key = normalize_line(&sentence);
            if !key.is_empty() {
                if seen.contains(&key) {
                    start = end;
                    i += 1;
                    continue;
                }
                seen.push(key);
            }
            out.push_str(&sentence);
            start = end;
        }
        i += 1;
    }
    restore_abbreviations(&out)
}

/// Runs the full chain in pipeline order.
#[must_use]
pub fn apply_chain(text: &str, questions: &[String]) -> String {
    let text = strip_citations(text);
    let text = drop_heading_echoes(&text, questions);
    let text = humanize_no_data(&text);
    let text = strip_labels(&text);
    let text = strip_generic_trailing_cta(&text);
    let text = normalize_vocabulary(&text);
    let text = trim_incomplete_tail(&text);
    let text = strip_double_zero_artifacts(&text);
    let text = exclamations_to_periods(&text);
    let text = dedupe_sentences(&text);
    collapse_whitespace(&text)
}

/// Collapses runs of spaces left behind by the removals.
#[must_use]
pub fn collapse_whitespace(text: &str) -> String {
    static RUNS: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r" {2,}").expect("static regex: space runs"));
    RUNS.replace_all(text.trim(), " ").to_string()
}

/// Normalized comparison key for a line or sentence.
fn normalize_line(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn protect_abbreviations(text: &str) -> String {
    let mut out = text.to_string();
    for abbr in ABBREVIATIONS {
        out = out.replace(abbr, &abbr.replace('.', "\u{1}"));
    }
    out
}

fn restore_abbreviations(text: &str) -> String {
    text.replace('\u{1}', ".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_citations() {
        let text = "Courses run twice a week [1]. See pricing 【4:2†source】 for details (source: pricing.md).";
        let out = strip_citations(text);
        assert!(!out.contains("[1]"));
        assert!(!out.contains('【'));
        assert!(!out.contains("(source:"));
    }

    #[test]
    fn test_drop_heading_echoes() {
        let questions = vec!["What do the courses cost?".to_string()];
        let text = "# What do the courses cost?\nPlans start at $49 a month.";
        let out = drop_heading_echoes(text, &questions);
        assert_eq!(out, "Plans start at $49 a month.");
    }

    #[test]
    fn test_heading_without_echo_survives() {
        let questions = vec!["What do the courses cost?".to_string()];
        let text = "# Our approach\nWe teach through projects.";
        let out = drop_heading_echoes(text, &questions);
        assert!(out.contains("Our approach"));
    }

    #[test]
    fn test_humanize_no_data() {
        let text = "The documents do not contain schedule details.";
        let out = humanize_no_data(text);
        assert!(!out.to_lowercase().contains("documents do not"));
        assert!(out.contains("manager will confirm"));
    }

    #[test]
    fn test_strip_labels() {
        let text = "Briefly: plans start at $49.\nImportant: seats are limited.";
        let out = strip_labels(text);
        assert_eq!(out, "plans start at $49.\nseats are limited.");
    }

    #[test]
    fn test_strip_generic_trailing_cta() {
        let text = "Plans start at $49. Feel free to reach out!";
        let out = strip_generic_trailing_cta(text);
        assert_eq!(out, "Plans start at $49.");
    }

    #[test]
    fn test_normalize_vocabulary() {
        let out = normalize_vocabulary("Book a пробный урок today");
        assert_eq!(out, "Book a trial lesson today");
    }

    #[test]
    fn test_trim_incomplete_tail() {
        let text = "The course runs twice a week. Each lesson las";
        assert_eq!(trim_incomplete_tail(text), "The course runs twice a week.");
        // Complete text untouched
        assert_eq!(trim_incomplete_tail("All good."), "All good.");
        // A lone fragment is kept, not erased
        assert_eq!(trim_incomplete_tail("just a fragment"), "just a fragment");
    }

    #[test]
    fn test_trim_incomplete_tail_protects_abbreviations() {
        let text = "We teach Scratch, Python, etc. and the lesson las";
        assert_eq!(
            trim_incomplete_tail(text),
            // "etc." must not be treated as the sentence end... unless it is
            // the only boundary available, which it is not here
            "We teach Scratch, Python, etc. and the lesson las"
        );
    }

    #[test]
    fn test_strip_double_zero() {
        assert_eq!(
            strip_double_zero_artifacts("The price is 00 $49 per month"),
            "The price is $49 per month"
        );
        // Legitimate numbers survive
        assert_eq!(strip_double_zero_artifacts("Lessons at 10:00"), "Lessons at 10:00");
        assert_eq!(strip_double_zero_artifacts("Costs 1000 rubles"), "Costs 1000 rubles");
        assert_eq!(strip_double_zero_artifacts("About 100 kids"), "About 100 kids");
    }

    #[test]
    fn test_exclamations_to_periods() {
        assert_eq!(exclamations_to_periods("Great! Join us!"), "Great. Join us.");
    }

    #[test]
    fn test_dedupe_sentences() {
        let text = "Plans start at $49. plans  start at $49. Lessons run weekly.";
        assert_eq!(dedupe_sentences(text), "Plans start at $49. Lessons run weekly.");
    }

    #[test]
    fn test_dedupe_protects_abbreviations() {
        let text = "We teach Scratch, Python, etc. We teach robots.";
        let out = dedupe_sentences(text);
        assert!(out.contains("etc."));
        assert!(out.contains("robots."));
    }

    #[test]
    fn test_apply_chain_order() {
        let questions = vec!["What does it cost?".to_string()];
        let text = "# What does it cost?\nBriefly: plans start at $49 [2]! Plans start at $49! Feel free to reach out!";
        let out = apply_chain(text, &questions);
        assert!(!out.contains('#'));
        assert!(!out.contains("Briefly"));
        assert!(!out.contains('!'));
        assert!(!out.contains("[2]"));
        // Duplicate sentence collapsed
        assert_eq!(out.matches("lans start at $49").count(), 1);
    }
}
