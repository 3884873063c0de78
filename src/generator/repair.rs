//! Targeted repairs applied after the generic post-processing chain.
//!
//! These passes fix domain facts the model tends to get wrong (the school
//! URL, missing trial-lesson contact details) rather than general text
//! hygiene.
// Allow expect() on static regex patterns - these are guaranteed to compile
#![allow(clippy::expect_used)]

use crate::models::SocialContext;
use regex::Regex;
use std::sync::LazyLock;

/// The one real site; everything else the model invents gets rewritten.
pub const CANONICAL_DOMAIN: &str = "brightkids.school";

static WRONG_DOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:www\.)?bright[\s-]?kids?\.(?:com|ru|org|net|io|online)\b|\bbrightkids\s*\.\s*school\b")
        .expect("static regex: wrong domain")
});

static MENTIONS_TRIAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)trial lesson|пробн\w+ (урок|заняти)").expect("static regex: trial mention")
});

static HAS_CONTACT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)brightkids\.school|whatsapp|telegram|manager will (reach|contact|message)")
        .expect("static regex: contact mention")
});

static USER_READINESS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(ready|let's start|how do (i|we) (book|sign)|want to try|готовы?|хотим попробовать|запишите)\b")
        .expect("static regex: readiness hints")
});

static MENTIONS_LOCATION_QUESTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(where|address|campus|offline|in[\s-]person|classroom|где|адрес|очно)\b")
        .expect("static regex: location hints")
});

static HAS_ONLINE_NOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bonline\b|\bонлайн\b").expect("static regex: online note"));

const TRIAL_CONTACT_SENTENCE: &str =
    "To book the trial lesson, leave a request at brightkids.school and the manager will message you the same day.";

const ONLINE_NOTE_SENTENCE: &str =
    "All BrightKids lessons are held online, so there is no campus to visit.";

const GREETING_PREFIX: &str = "Hello, thank you for writing to us.";

/// Rewrites invented domain variants to the canonical one.
#[must_use]
pub fn normalize_domain(text: &str) -> String {
    WRONG_DOMAIN.replace_all(text, CANONICAL_DOMAIN).to_string()
}

/// Prepends a greeting when the router saw a greeting but the model reply
/// skipped it.
#[must_use]
pub fn ensure_greeting(text: &str, social: Option<SocialContext>) -> String {
    let wants_greeting = matches!(
        social,
        Some(SocialContext::Greeting | SocialContext::RepeatedGreeting)
    );
    if !wants_greeting {
        return text.to_string();
    }
    let lower = text.to_lowercase();
    let already = ["hello", "hi ", "hi,", "good morning", "good afternoon", "здравствуй", "привет", "добрый"]
        .iter()
        .any(|g| lower.starts_with(g));
    if already {
        text.to_string()
    } else {
        format!("{GREETING_PREFIX} {text}")
    }
}

/// Appends contact instructions when a trial lesson is on the table (the
/// reply offers one, or the parent signals readiness) but the reply gives no
/// way to actually book it.
#[must_use]
pub fn insert_trial_contact(text: &str, user_message: &str) -> String {
    let relevant = MENTIONS_TRIAL.is_match(text) || USER_READINESS.is_match(user_message);
    if relevant && !HAS_CONTACT.is_match(text) {
        append_sentence(text, TRIAL_CONTACT_SENTENCE)
    } else {
        text.to_string()
    }
}

/// Appends the online-format note when the parent asked about a physical
/// location and the reply never clarified.
#[must_use]
pub fn insert_online_note(text: &str, user_message: &str) -> String {
    if MENTIONS_LOCATION_QUESTION.is_match(user_message) && !HAS_ONLINE_NOTE.is_match(text) {
        append_sentence(text, ONLINE_NOTE_SENTENCE)
    } else {
        text.to_string()
    }
}

/// Runs all repairs in order.
#[must_use]
pub fn apply(text: &str, social: Option<SocialContext>, user_message: &str) -> String {
    let text = normalize_domain(text);
    let text = ensure_greeting(&text, social);
    let text = insert_trial_contact(&text, user_message);
    insert_online_note(&text, user_message)
}

/// Appends `sentence` after the last complete sentence boundary; if the text
/// has no terminal punctuation, a period is added first.
fn append_sentence(text: &str, sentence: &str) -> String {
    let trimmed = text.trim_end();
    if trimmed.is_empty() {
        return sentence.to_string();
    }
    if trimmed.ends_with(['.', '!', '?']) {
        format!("{trimmed} {sentence}")
    } else {
        format!("{trimmed}. {sentence}")
    }
}
