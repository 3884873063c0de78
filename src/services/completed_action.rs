//! Completed-action handler.
//!
//! Reclassifies short statements of a finished real-world action ("I already
//! paid") from `offtopic` to `success`, so the pipeline acknowledges instead
//! of deflecting. Five action families, each with trigger keywords, optional
//! exclusion words, a canned acknowledgment pool, implicit follow-up
//! questions, and a fixed document set. The payment family additionally
//! requires school-context vocabulary in the message or the recent history.
// Allow expect() on static regex patterns - these are guaranteed to compile
#![allow(clippy::expect_used)]

use crate::models::{RouterResult, RouterStatus, Turn};
use crate::services::chooser::Chooser;
use crate::services::cta::{ActionTag, CtaTracker};
use regex::Regex;
use std::sync::{Arc, LazyLock};

/// History turns scanned for school-context confirmation.
const CONTEXT_WINDOW: usize = 6;

/// Word cap: completed actions are short, non-interrogative statements.
const MAX_ACTION_WORDS: usize = 10;

/// A completed-action family rule.
struct ActionRule {
    tag: ActionTag,
    name: &'static str,
    trigger: &'static LazyLock<Regex>,
    /// Words that reject false positives ("paid for gas").
    exclusions: &'static [&'static str],
    /// Only fire when school context is confirmed.
    needs_school_context: bool,
    acknowledgments: &'static [&'static str],
    followups: &'static [&'static str],
    documents: &'static [&'static str],
}

static PAYMENT_TRIGGER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(paid|payment\s+(done|went\s+through)|оплатил|оплатили|оплата\s+прошла)")
        .expect("static regex: payment trigger")
});

static REGISTRATION_TRIGGER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(registered|signed\s+up|enrolled|зарегистрировал|записал[аи]?сь)")
        .expect("static regex: registration trigger")
});

static TRIAL_TRIGGER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(attended|finished|took)\s+.{0,20}(trial|first\s+lesson)|были\s+на\s+пробном|прошли\s+пробн")
        .expect("static regex: trial trigger")
});

static FORM_TRIGGER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(filled\s+(in|out)|submitted)\s+.{0,15}form|заполнил[аи]?\s+(анкету|форму)")
        .expect("static regex: form trigger")
});

static DOCUMENTS_TRIGGER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(sent|emailed)\s+.{0,20}(documents|papers)|отправил[аи]?\s+документы")
        .expect("static regex: documents trigger")
});

/// School-context vocabulary for the payment family. "Paid" without any of
/// these nearby likely refers to something else entirely.
static SCHOOL_CONTEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(course|lesson|school|class|tuition|subscription|brightkids|курс|урок|занят|школ|абонемент)")
        .expect("static regex: school context")
});

static QUESTION_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(how|what|when|where|why|can|do|does|is|are|как|что|когда|где|почему|можно)\b")
        .expect("static regex: question words")
});

static RULES: LazyLock<Vec<ActionRule>> = LazyLock::new(|| {
    vec![
        ActionRule {
            tag: ActionTag::Paid,
            name: "payment",
            trigger: &PAYMENT_TRIGGER,
            exclusions: &["gas", "rent", "taxi", "парковк", "бензин"],
            needs_school_context: true,
            acknowledgments: &[
                "Great, the payment is in. Thank you for trusting us with your child's learning.",
                "Wonderful, we see payments like yours processed within a few minutes.",
            ],
            followups: &[
                "When does the first lesson take place?",
                "How do we access the learning platform?",
                "What should the child prepare before the first lesson?",
            ],
            documents: &["onboarding.md", "platform.md"],
        },
        ActionRule {
            tag: ActionTag::Registered,
            name: "registration",
            trigger: &REGISTRATION_TRIGGER,
            exclusions: &["newsletter", "рассылк"],
            needs_school_context: false,
            acknowledgments: &[
                "Registration received. You're one step away from the first lesson.",
                "Great, your registration is in our system.",
            ],
            followups: &[
                "What happens after registration?",
                "How is the trial lesson scheduled?",
            ],
            documents: &["onboarding.md", "faq.md"],
        },
        ActionRule {
            tag: ActionTag::TrialCompleted,
            name: "trial",
            trigger: &TRIAL_TRIGGER,
            exclusions: &[],
            needs_school_context: false,
            acknowledgments: &[
                "Hope the trial lesson went well. Happy to help with the next step.",
                "Thanks for attending the trial. Most parents decide within a couple of days.",
            ],
            followups: &[
                "How do we continue after the trial?",
                "What do the full courses cost?",
            ],
            documents: &["pricing.md", "courses.md"],
        },
        ActionRule {
            tag: ActionTag::FormFilled,
            name: "form",
            trigger: &FORM_TRIGGER,
            exclusions: &[],
            needs_school_context: false,
            acknowledgments: &[
                "Got it, the form is with us. We'll be in touch shortly.",
            ],
            followups: &[
                "When will someone contact us?",
                "What happens after the form is reviewed?",
            ],
            documents: &["onboarding.md", "faq.md"],
        },
        ActionRule {
            tag: ActionTag::FormFilled,
            name: "documents",
            trigger: &DOCUMENTS_TRIGGER,
            exclusions: &[],
            needs_school_context: false,
            acknowledgments: &[
                "Thank you, the documents arrived. We'll review them and confirm.",
            ],
            followups: &[
                "How long does the review take?",
                "Is anything else needed from our side?",
            ],
            documents: &["faq.md", "onboarding.md"],
        },
    ]
});

/// Heuristic that rewrites offtopic completed-action statements.
pub struct CompletedActionHandler {
    chooser: Arc<dyn Chooser>,
    cta: Arc<CtaTracker>,
}

impl CompletedActionHandler {
    /// Creates a handler over the shared chooser and CTA tracker.
    #[must_use]
    pub fn new(chooser: Arc<dyn Chooser>, cta: Arc<CtaTracker>) -> Self {
        Self { chooser, cta }
    }

    /// Rewrites an `offtopic` result when the message describes a finished
    /// action with confirmed context. Everything else passes through.
    #[must_use]
    pub fn detect(
        &self,
        message: &str,
        result: RouterResult,
        history: &[Turn],
        user_id: &str,
    ) -> RouterResult {
        if result.status != RouterStatus::Offtopic {
            return result;
        }
        // Actions are short, non-interrogative statements
        if message.contains('?')
            || QUESTION_WORDS.is_match(message.trim())
            || message.split_whitespace().count() > MAX_ACTION_WORDS
        {
            return result;
        }

        let lower = message.to_lowercase();
        for rule in RULES.iter() {
            if !rule.trigger.is_match(message) {
                continue;
            }
            if rule.exclusions.iter().any(|w| lower.contains(w)) {
                tracing::debug!(family = rule.name, "action trigger excluded by keyword");
                continue;
            }
            if rule.needs_school_context && !school_context_confirmed(message, history) {
                tracing::debug!(family = rule.name, "action trigger without school context");
                continue;
            }

            tracing::debug!(family = rule.name, user_id = %user_id, "completed action detected, rewriting offtopic to success");
            self.cta.record_action(user_id, rule.tag);
            let ack = rule.acknowledgments[self.chooser.pick(rule.acknowledgments.len())];
            return RouterResult {
                status: RouterStatus::Success,
                documents: rule.documents.iter().map(|d| (*d).to_string()).collect(),
                decomposed_questions: rule.followups.iter().map(|q| (*q).to_string()).collect(),
                user_signal: result.user_signal,
                social_context: result.social_context,
                message: Some(ack.to_string()),
                original_message: result.original_message,
            };
        }
        result
    }
}

/// School context counts when present in the message itself or within the
/// last few history turns.
fn school_context_confirmed(message: &str, history: &[Turn]) -> bool {
    if SCHOOL_CONTEXT.is_match(message) {
        return true;
    }
    history
        .iter()
        .rev()
        .take(CONTEXT_WINDOW)
        .any(|turn| SCHOOL_CONTEXT.is_match(&turn.content))
}
