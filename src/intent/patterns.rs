//! Social intent detection patterns.
//!
//! Static pattern data for the regex-based social intent detector. The
//! trigger vocabulary is bilingual (RU/EN) because the widget serves both.
// Allow expect() on static regex patterns - these are guaranteed to compile
#![allow(clippy::expect_used)]

use regex::Regex;
use std::sync::LazyLock;

use super::SocialCategory;

/// A social signal pattern with its category.
#[derive(Debug)]
pub struct SocialSignal {
    /// The regex pattern to match.
    pub pattern: Regex,
    /// The category this pattern indicates.
    pub category: SocialCategory,
    /// Human-readable description of the signal.
    #[allow(dead_code)]
    pub description: &'static str,
}

/// Static social signal patterns, ordered by family.
///
/// The detector returns the first matching family, so greeting patterns
/// are checked before farewell, thanks, apology.
pub static SOCIAL_SIGNALS: LazyLock<Vec<SocialSignal>> = LazyLock::new(|| {
    vec![
        // Greeting patterns
        SocialSignal {
            pattern: Regex::new(r"(?i)\b(hello|hi|hey|good\s+(morning|afternoon|evening))\b")
                .expect("static regex: hello"),
            category: SocialCategory::Greeting,
            description: "hello/hi/hey",
        },
        SocialSignal {
            pattern: Regex::new(r"(?i)(привет|здравствуй|здравствуйте|добрый\s+(день|вечер)|доброе\s+утро)")
                .expect("static regex: privet"),
            category: SocialCategory::Greeting,
            description: "привет/здравствуйте",
        },
        // Farewell patterns
        SocialSignal {
            pattern: Regex::new(r"(?i)\b(bye|goodbye|see\s+you|good\s+night)\b")
                .expect("static regex: bye"),
            category: SocialCategory::Farewell,
            description: "bye/goodbye",
        },
        SocialSignal {
            pattern: Regex::new(r"(?i)(пока|до\s+свидания|до\s+встречи|всего\s+доброго)")
                .expect("static regex: poka"),
            category: SocialCategory::Farewell,
            description: "пока/до свидания",
        },
        // Thanks patterns
        SocialSignal {
            pattern: Regex::new(r"(?i)\b(thanks|thank\s+you|thx|appreciated)\b")
                .expect("static regex: thanks"),
            category: SocialCategory::Thanks,
            description: "thanks/thank you",
        },
        SocialSignal {
            pattern: Regex::new(r"(?i)(спасибо|благодарю)").expect("static regex: spasibo"),
            category: SocialCategory::Thanks,
            description: "спасибо/благодарю",
        },
        // Apology patterns
        SocialSignal {
            pattern: Regex::new(r"(?i)\b(sorry|my\s+apologies|apologize)\b")
                .expect("static regex: sorry"),
            category: SocialCategory::Apology,
            description: "sorry/apologies",
        },
        SocialSignal {
            pattern: Regex::new(r"(?i)(извините|извини|простите|прошу\s+прощения)")
                .expect("static regex: izvinite"),
            category: SocialCategory::Apology,
            description: "извините/простите",
        },
    ]
});

/// Explicit business-hint patterns.
///
/// A social message that also matches one of these is ambiguous and must be
/// routed to the business pipeline, not answered with a pure social reply.
pub static BUSINESS_HINT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\b(course|courses|class|classes|lesson|lessons|program)\b")
            .expect("static regex: course"),
        Regex::new(r"(?i)\b(price|prices|cost|pay|payment|tariff|discount)\b")
            .expect("static regex: price"),
        Regex::new(r"(?i)\b(teacher|tutor|schedule|enroll|enrollment|trial|sign\s+up)\b")
            .expect("static regex: teacher"),
        Regex::new(r"(?i)(курс|занят|урок|программ)").expect("static regex: kurs"),
        Regex::new(r"(?i)(цена|цены|стоимость|оплат|тариф|скидк)").expect("static regex: tsena"),
        Regex::new(r"(?i)(препода|расписан|запис|пробн)").expect("static regex: prepod"),
    ]
});

/// Keywords the fuzzy matcher checks misspelled words against.
///
/// Catches "cuorse", "pirce" style typos the explicit patterns miss.
pub const BUSINESS_KEYWORDS: &[&str] = &[
    "course", "price", "lesson", "teacher", "schedule", "discount", "trial", "enroll", "payment",
    "курс", "цена", "занятие", "урок", "скидка", "оплата",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signals_compile() {
        // Force lazy initialization; a bad pattern would panic here
        assert!(!SOCIAL_SIGNALS.is_empty());
        assert!(!BUSINESS_HINT_PATTERNS.is_empty());
    }

    #[test]
    fn test_greeting_patterns_match() {
        let matched = SOCIAL_SIGNALS
            .iter()
            .any(|s| s.category == SocialCategory::Greeting && s.pattern.is_match("hello there"));
        assert!(matched);
        let matched = SOCIAL_SIGNALS
            .iter()
            .any(|s| s.category == SocialCategory::Greeting && s.pattern.is_match("Добрый день"));
        assert!(matched);
    }

    #[test]
    fn test_business_hints_match() {
        assert!(BUSINESS_HINT_PATTERNS.iter().any(|p| p.is_match("what is the price")));
        assert!(BUSINESS_HINT_PATTERNS.iter().any(|p| p.is_match("сколько стоимость курса")));
        assert!(!BUSINESS_HINT_PATTERNS.iter().any(|p| p.is_match("nice weather today")));
    }
}
