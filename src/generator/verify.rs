//! Verification that a requested call to action actually made it into the
//! model reply, with a deterministic append fallback when it did not.

use crate::models::CtaKind;

/// Keyword sets that count as evidence of each CTA kind.
const DISCOUNT_KEYWORDS: &[&str] = &["discount", "% off", "promo", "скидк"];
const TRIAL_KEYWORDS: &[&str] = &["trial lesson", "free lesson", "пробн"];
const SIGNUP_KEYWORDS: &[&str] = &["enroll", "sign up", "signing up", "записат", "запишем"];

/// Fallback sentences appended when the model ignored the CTA instruction.
#[must_use]
pub fn fallback_sentence(kind: CtaKind) -> &'static str {
    match kind {
        CtaKind::Discount => {
            "By the way, new families get a discount on the first month right now, the manager can apply it when you enroll."
        }
        CtaKind::Trial => {
            "If it helps to see the format first, we can arrange a free trial lesson, just leave a request at brightkids.school."
        }
        CtaKind::SignUp => {
            "When you are ready, enrollment takes about five minutes at brightkids.school and the first lesson can be scheduled the same week."
        }
    }
}

/// Checks whether the reply contains the requested CTA: direct keyword hit,
/// or at least 30% token overlap with the fallback sentence.
#[must_use]
pub fn cta_present(text: &str, kind: CtaKind) -> bool {
    let lower = text.to_lowercase();
    let keywords = match kind {
        CtaKind::Discount => DISCOUNT_KEYWORDS,
        CtaKind::Trial => TRIAL_KEYWORDS,
        CtaKind::SignUp => SIGNUP_KEYWORDS,
    };
    if keywords.iter().any(|k| lower.contains(k)) {
        return true;
    }
    token_overlap(&lower, &fallback_sentence(kind).to_lowercase()) >= 0.3
}

/// Appends the fallback CTA sentence when the reply lacks one. Returns the
/// (possibly amended) text and whether an append happened.
#[must_use]
pub fn ensure_cta(text: &str, kind: CtaKind) -> (String, bool) {
    if cta_present(text, kind) {
        return (text.to_string(), false);
    }
    let trimmed = text.trim_end();
    let glued = if trimmed.is_empty() {
        fallback_sentence(kind).to_string()
    } else if trimmed.ends_with(['.', '!', '?']) {
        format!("{trimmed} {}", fallback_sentence(kind))
    } else {
        format!("{trimmed}. {}", fallback_sentence(kind))
    };
    (glued, true)
}

/// Fraction of reference tokens (length >= 4) present in the candidate.
fn token_overlap(candidate: &str, reference: &str) -> f32 {
    let ref_tokens: Vec<&str> = reference
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() >= 4)
        .collect();
    if ref_tokens.is_empty() {
        return 0.0;
    }
    let hits = ref_tokens.iter().filter(|t| candidate.contains(*t)).count();
    hits as f32 / ref_tokens.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cta_present_by_keyword() {
        assert!(cta_present("New families get a 20% discount this month.", CtaKind::Discount));
        assert!(cta_present("We can book a free trial lesson.", CtaKind::Trial));
        assert!(cta_present("You can enroll today.", CtaKind::SignUp));
    }

    #[test]
    fn test_cta_absent() {
        let text = "Lessons run twice a week and last 60 minutes.";
        assert!(!cta_present(text, CtaKind::Discount));
        assert!(!cta_present(text, CtaKind::Trial));
        assert!(!cta_present(text, CtaKind::SignUp));
    }

    #[test]
    fn test_cta_present_by_overlap() {
        // Paraphrase without any keyword, but sharing enough tokens with the
        // fallback sentence
        let text = "Leave a request at brightkids.school and the manager can schedule the first lesson the same week.";
        assert!(cta_present(text, CtaKind::SignUp));
    }

    #[test]
    fn test_ensure_cta_appends() {
        let (out, added) = ensure_cta("Lessons run twice a week.", CtaKind::Trial);
        assert!(added);
        assert!(out.starts_with("Lessons run twice a week."));
        assert!(out.contains("trial lesson"));
    }

    #[test]
    fn test_ensure_cta_no_duplicate() {
        let text = "We can arrange a free trial lesson for your child.";
        let (out, added) = ensure_cta(text, CtaKind::Trial);
        assert!(!added);
        assert_eq!(out, text);
    }
}
