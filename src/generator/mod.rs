//! Response generation: offer selection, prompt assembly, model call, and
//! the deterministic cleanup pipeline.
//!
//! The generator only produces text for `success` router results; everything
//! else falls back to the canned message the router attached. Offer (CTA)
//! injection is stateful per user and gated by the [`CtaTracker`] plus the
//! eligibility rules in [`ResponseGenerator::should_add_offer`].

pub mod postprocess;
pub mod prompt;
pub mod repair;
pub mod verify;

use crate::config::CtaPolicy;
use crate::llm::{LlmProvider, SamplingParams};
use crate::models::{CtaKind, GenerationMetadata, RouterResult, RouterStatus, Turn, UserSignal};
use crate::router::{FALLBACK_MESSAGE, OFFTOPIC_MESSAGE};
use crate::services::{Chooser, CtaTracker};
use crate::storage::DocumentStore;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, RwLock};
use tracing::{debug, warn};

/// Sampling used for generation calls.
const GENERATION_PARAMS: SamplingParams = SamplingParams {
    temperature: Some(0.7),
    max_tokens: Some(700),
};

#[allow(clippy::expect_used)]
static DISCOUNT_QUESTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(discount|promo|coupon|скидк|промокод)")
        .expect("static regex: discount question")
});

/// A CTA the offer catalog selected for injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Offer {
    /// What to offer.
    pub kind: CtaKind,
    /// Whether the offer opens the reply (otherwise it closes it).
    pub at_start: bool,
}

/// Offer catalog: which CTA fits which detected signal, and where it goes.
#[must_use]
pub fn offer_for_signal(signal: UserSignal) -> Offer {
    match signal {
        UserSignal::PriceSensitive => Offer {
            kind: CtaKind::Discount,
            at_start: true,
        },
        UserSignal::AnxietyAboutChild => Offer {
            kind: CtaKind::Trial,
            at_start: false,
        },
        UserSignal::ReadyToBuy => Offer {
            kind: CtaKind::SignUp,
            at_start: true,
        },
        UserSignal::ExploringOnly => Offer {
            kind: CtaKind::Trial,
            at_start: false,
        },
    }
}

/// Per-user offer bookkeeping.
#[derive(Debug, Default)]
struct OfferState {
    discount_ctas: u32,
    last_cta_index: Option<usize>,
    streak_signal: Option<UserSignal>,
    streak: u32,
}

/// LLM-backed reply generator with stateful CTA injection.
pub struct ResponseGenerator {
    provider: Arc<dyn LlmProvider>,
    documents: Arc<DocumentStore>,
    cta: Arc<CtaTracker>,
    chooser: Arc<dyn Chooser>,
    policy: CtaPolicy,
    offers: RwLock<HashMap<String, OfferState>>,
}

impl ResponseGenerator {
    /// Creates a generator over the given provider and stores.
    #[must_use]
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        documents: Arc<DocumentStore>,
        cta: Arc<CtaTracker>,
        chooser: Arc<dyn Chooser>,
        policy: CtaPolicy,
    ) -> Self {
        Self {
            provider,
            documents,
            cta,
            chooser,
            policy,
            offers: RwLock::new(HashMap::new()),
        }
    }

    /// Generates a reply for a router result.
    ///
    /// Never fails: non-success results, missing documents, and provider
    /// errors all degrade to canned text.
    pub fn generate(
        &self,
        result: &RouterResult,
        history: &[Turn],
        user_id: &str,
        message_index: usize,
    ) -> (String, GenerationMetadata) {
        let streak = self.note_signal(user_id, result.user_signal);

        if result.status != RouterStatus::Success
            || result.documents.is_empty()
            || result.decomposed_questions.is_empty()
        {
            let text = result
                .message
                .clone()
                .unwrap_or_else(|| FALLBACK_MESSAGE.to_string());
            return (text, metadata_for_status(result));
        }

        let bodies = self.documents.load_bodies(&result.documents);
        if bodies.is_empty() {
            // Hallucination guard: the router named documents that do not
            // exist on disk, so there is nothing to ground an answer in
            warn!(
                user_id,
                documents = ?result.documents,
                "no document bodies loaded, refusing to answer from nothing"
            );
            return (
                OFFTOPIC_MESSAGE.to_string(),
                GenerationMetadata {
                    intent: "hallucination_guard".to_string(),
                    user_signal: result.user_signal,
                    cta_added: false,
                    cta_kind: None,
                    humor_generated: false,
                },
            );
        }

        let offer = self.should_add_offer(user_id, message_index, result, streak);

        let mut system = format!(
            "{}\n\n{}",
            prompt::GENERATOR_SYSTEM_PROMPT,
            prompt::tone_block(result.user_signal)
        );
        if let Some(offer) = offer {
            system.push_str("\n\n");
            system.push_str(&prompt::cta_block(offer.kind, offer.at_start));
        }
        let user_prompt = prompt::build_user_prompt(result, &bodies, history);

        let completion =
            match self
                .provider
                .complete_with_system(&system, &user_prompt, &GENERATION_PARAMS)
            {
                Ok(text) => text,
                Err(err) => {
                    warn!(user_id, error = %err, "generator model call failed");
                    return (
                        FALLBACK_MESSAGE.to_string(),
                        GenerationMetadata {
                            intent: "fallback".to_string(),
                            user_signal: result.user_signal,
                            cta_added: false,
                            cta_kind: None,
                            humor_generated: false,
                        },
                    );
                }
            };

        let text = postprocess::apply_chain(&completion, &result.decomposed_questions);
        // A success result carrying a message is the completed-action
        // rewrite; its chosen acknowledgment opens the reply
        let text = match result.message.as_deref() {
            Some(ack) => format!("{ack} {text}"),
            None => text,
        };
        let text = repair::apply(&text, result.social_context, &result.original_message);

        let (text, cta_added, cta_kind) = match offer {
            Some(offer) => {
                let (text, appended) = verify::ensure_cta(&text, offer.kind);
                if appended {
                    debug!(user_id, kind = ?offer.kind, "cta missing from reply, appended fallback");
                }
                self.record_offer(user_id, message_index, offer.kind);
                (text, true, Some(offer.kind))
            }
            None => (text, false, None),
        };

        (
            text,
            GenerationMetadata {
                intent: "business".to_string(),
                user_signal: result.user_signal,
                cta_added,
                cta_kind,
                humor_generated: false,
            },
        )
    }

    /// Decides whether a CTA should be woven into this reply.
    fn should_add_offer(
        &self,
        user_id: &str,
        message_index: usize,
        result: &RouterResult,
        streak: u32,
    ) -> Option<Offer> {
        let signal = result.user_signal?;
        let offer = offer_for_signal(signal);

        let decision = self.cta.should_block(user_id, message_index, offer.kind);
        if decision.blocked {
            debug!(user_id, reason = ?decision.reason, "cta blocked");
            return None;
        }

        {
            let states = self.offers.read().ok()?;
            if let Some(state) = states.get(user_id) {
                if offer.kind == CtaKind::Discount
                    && state.discount_ctas >= self.policy.max_discount_ctas
                {
                    debug!(user_id, "discount cta cap reached");
                    return None;
                }
                if let Some(last) = state.last_cta_index {
                    if message_index.saturating_sub(last) < self.policy.min_messages_between_ctas {
                        debug!(user_id, "cta cooldown active");
                        return None;
                    }
                }
            }
        }

        match signal {
            // Only every second consecutive price-sensitive message earns a
            // discount nudge
            UserSignal::PriceSensitive
                if self.policy.price_sensitive_even_parity && streak % 2 != 0 =>
            {
                debug!(user_id, streak, "price-sensitive parity skip");
                return None;
            }
            // Anxious parents get a trial offer only once the signal recurs;
            // the first reply is reassurance without any pitch
            UserSignal::AnxietyAboutChild if streak < self.policy.anxiety_min_streak => {
                debug!(user_id, streak, "anxiety streak too short for a pitch");
                return None;
            }
            _ => {}
        }

        // If the parent is asking about discounts directly, the answer
        // already covers them; injecting a discount CTA would be redundant
        if offer.kind == CtaKind::Discount
            && DISCOUNT_QUESTION.is_match(&result.original_message)
        {
            debug!(user_id, "direct discount question, skipping discount cta");
            return None;
        }

        let modifier = self.cta.frequency_modifier(user_id);
        if self.chooser.roll() >= modifier {
            debug!(user_id, modifier, "frequency draw failed");
            return None;
        }

        Some(offer)
    }

    /// Updates the per-user signal streak and returns its current length
    /// (1 for the first occurrence). A different or absent signal resets it.
    fn note_signal(&self, user_id: &str, signal: Option<UserSignal>) -> u32 {
        let Ok(mut states) = self.offers.write() else {
            return 0;
        };
        let state = states.entry(user_id.to_string()).or_default();
        match signal {
            Some(signal) if state.streak_signal == Some(signal) => state.streak += 1,
            Some(signal) => {
                state.streak_signal = Some(signal);
                state.streak = 1;
            }
            None => {
                state.streak_signal = None;
                state.streak = 0;
            }
        }
        state.streak
    }

    fn record_offer(&self, user_id: &str, message_index: usize, kind: CtaKind) {
        let Ok(mut states) = self.offers.write() else {
            return;
        };
        let state = states.entry(user_id.to_string()).or_default();
        state.last_cta_index = Some(message_index);
        if kind == CtaKind::Discount {
            state.discount_ctas += 1;
        }
    }

    /// Drops per-user offer bookkeeping (history reset).
    pub fn clear(&self, user_id: &str) {
        if let Ok(mut states) = self.offers.write() {
            states.remove(user_id);
        }
    }
}

fn metadata_for_status(result: &RouterResult) -> GenerationMetadata {
    let intent = match result.status {
        RouterStatus::Offtopic => "offtopic",
        RouterStatus::NeedSimplification => "need_simplification",
        RouterStatus::Success => "fallback",
    };
    GenerationMetadata {
        intent: intent.to_string(),
        user_signal: result.user_signal,
        cta_added: false,
        cta_kind: None,
        humor_generated: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatMessage;
    use crate::models::SocialContext;
    use crate::services::FixedChooser;
    use crate::Result;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct ScriptedProvider {
        responses: Mutex<Vec<Result<String>>>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<Result<String>>) -> Self {
            Self {
                responses: Mutex::new(responses),
            }
        }
    }

    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn complete(&self, _messages: &[ChatMessage], _params: &SamplingParams) -> Result<String> {
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Ok("Plans start at $49 a month.".to_string())
            } else {
                responses.remove(0)
            }
        }
    }

    fn docs_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("pricing.md"),
            "# Pricing\nPlans start at $49 a month. The first month has a 20% discount.",
        )
        .unwrap();
        fs::write(
            dir.path().join("courses.md"),
            "# Courses\nScratch for ages 7-9, Python for ages 10-15.",
        )
        .unwrap();
        dir
    }

    fn success_result(signal: Option<UserSignal>) -> RouterResult {
        RouterResult {
            status: RouterStatus::Success,
            documents: vec!["pricing.md".to_string()],
            decomposed_questions: vec!["What do the plans cost?".to_string()],
            user_signal: signal,
            social_context: None,
            message: None,
            original_message: "how much per month".to_string(),
        }
    }

    fn generator(dir: &TempDir, responses: Vec<Result<String>>) -> ResponseGenerator {
        let store = DocumentStore::new(dir.path());
        ResponseGenerator::new(
            Arc::new(ScriptedProvider::new(responses)),
            Arc::new(store),
            Arc::new(CtaTracker::new(CtaPolicy::default())),
            Arc::new(FixedChooser),
            CtaPolicy::default(),
        )
    }

    #[test]
    fn test_non_success_returns_canned_message() {
        let dir = docs_dir();
        let generator = generator(&dir, vec![]);
        let result = RouterResult::offtopic("weather?", OFFTOPIC_MESSAGE);
        let (text, meta) = generator.generate(&result, &[], "u1", 0);
        assert_eq!(text, OFFTOPIC_MESSAGE);
        assert_eq!(meta.intent, "offtopic");
        assert!(!meta.cta_added);
    }

    #[test]
    fn test_hallucination_guard() {
        let dir = docs_dir();
        let generator = generator(&dir, vec![]);
        let mut result = success_result(None);
        result.documents = vec!["ghost.md".to_string()];
        let (text, meta) = generator.generate(&result, &[], "u1", 0);
        assert_eq!(text, OFFTOPIC_MESSAGE);
        assert_eq!(meta.intent, "hallucination_guard");
    }

    #[test]
    fn test_provider_failure_falls_back() {
        let dir = docs_dir();
        let generator = generator(
            &dir,
            vec![Err(crate::Error::OperationFailed {
                operation: "llm_request".to_string(),
                cause: "timeout".to_string(),
            })],
        );
        let (text, meta) = generator.generate(&success_result(None), &[], "u1", 0);
        assert_eq!(text, FALLBACK_MESSAGE);
        assert_eq!(meta.intent, "fallback");
    }

    #[test]
    fn test_plain_success_generates_without_cta() {
        let dir = docs_dir();
        let generator = generator(
            &dir,
            vec![Ok("Plans start at $49 a month, billed monthly.".to_string())],
        );
        let (text, meta) = generator.generate(&success_result(None), &[], "u1", 0);
        assert!(text.contains("$49"));
        assert_eq!(meta.intent, "business");
        assert!(!meta.cta_added);
        assert!(meta.cta_kind.is_none());
    }

    #[test]
    fn test_price_sensitive_cta_waits_for_even_streak() {
        let dir = docs_dir();
        let generator = generator(
            &dir,
            vec![
                Ok("Plans start at $49 a month.".to_string()),
                Ok("Plans start at $49 a month.".to_string()),
            ],
        );
        let result = success_result(Some(UserSignal::PriceSensitive));

        // First price-sensitive message: streak 1 (odd), no CTA
        let (_, meta) = generator.generate(&result, &[], "u1", 0);
        assert!(!meta.cta_added);

        // Second consecutive one: streak 2, discount CTA fires
        let (text, meta) = generator.generate(&result, &[], "u1", 1);
        assert!(meta.cta_added);
        assert_eq!(meta.cta_kind, Some(CtaKind::Discount));
        assert!(text.to_lowercase().contains("discount"));
    }

    #[test]
    fn test_anxiety_cta_waits_for_streak() {
        let dir = docs_dir();
        let generator = generator(
            &dir,
            vec![
                Ok("Our teachers work gently with beginners.".to_string()),
                Ok("Our teachers work gently with beginners.".to_string()),
            ],
        );
        let result = success_result(Some(UserSignal::AnxietyAboutChild));

        let (_, meta) = generator.generate(&result, &[], "u1", 0);
        assert!(!meta.cta_added);

        let (text, meta) = generator.generate(&result, &[], "u1", 1);
        assert!(meta.cta_added);
        assert_eq!(meta.cta_kind, Some(CtaKind::Trial));
        assert!(text.to_lowercase().contains("trial"));
    }

    #[test]
    fn test_ready_to_buy_cta_fires_immediately() {
        let dir = docs_dir();
        let generator = generator(
            &dir,
            vec![Ok("You can enroll at brightkids.school in five minutes.".to_string())],
        );
        let result = success_result(Some(UserSignal::ReadyToBuy));
        let (_, meta) = generator.generate(&result, &[], "u1", 0);
        assert!(meta.cta_added);
        assert_eq!(meta.cta_kind, Some(CtaKind::SignUp));
    }

    #[test]
    fn test_direct_discount_question_suppresses_discount_cta() {
        let dir = docs_dir();
        let generator = generator(
            &dir,
            vec![
                Ok("Plans start at $49 a month.".to_string()),
                Ok("Yes, there is a 20% discount on the first month.".to_string()),
            ],
        );
        let mut result = success_result(Some(UserSignal::PriceSensitive));
        let (_, meta) = generator.generate(&result, &[], "u1", 0);
        assert!(!meta.cta_added);

        // Streak is even now, but the message asks about discounts directly
        result.original_message = "do you have any discount?".to_string();
        let (_, meta) = generator.generate(&result, &[], "u1", 1);
        assert!(!meta.cta_added);
    }

    #[test]
    fn test_cta_cooldown_between_offers() {
        let dir = docs_dir();
        let generator = generator(
            &dir,
            vec![
                Ok("You can enroll today.".to_string()),
                Ok("You can enroll today.".to_string()),
                Ok("You can enroll today.".to_string()),
            ],
        );
        let result = success_result(Some(UserSignal::ReadyToBuy));

        let (_, meta) = generator.generate(&result, &[], "u1", 0);
        assert!(meta.cta_added);

        // One message later: inside the 3-message cooldown
        let (_, meta) = generator.generate(&result, &[], "u1", 1);
        assert!(!meta.cta_added);

        // Three messages after the first CTA: allowed again
        let (_, meta) = generator.generate(&result, &[], "u1", 3);
        assert!(meta.cta_added);
    }

    #[test]
    fn test_discount_cap_per_dialog() {
        let dir = docs_dir();
        let responses = (0..8)
            .map(|_| Ok("Plans start at $49 a month.".to_string()))
            .collect();
        let generator = generator(&dir, responses);
        let result = success_result(Some(UserSignal::PriceSensitive));

        let mut added = 0;
        for i in 0..8 {
            let (_, meta) = generator.generate(&result, &[], "u1", i);
            if meta.cta_added {
                added += 1;
            }
        }
        assert_eq!(added, 2, "discount CTAs must cap at two per dialog");
    }

    #[test]
    fn test_paid_user_never_sees_discount_cta() {
        let dir = docs_dir();
        let store = DocumentStore::new(dir.path());
        let tracker = Arc::new(CtaTracker::new(CtaPolicy::default()));
        tracker.check_completed_action("u1", "I already paid for the course");
        let generator = ResponseGenerator::new(
            Arc::new(ScriptedProvider::new(vec![
                Ok("Plans start at $49.".to_string()),
                Ok("Plans start at $49.".to_string()),
            ])),
            Arc::new(store),
            tracker,
            Arc::new(FixedChooser),
            CtaPolicy::default(),
        );
        let result = success_result(Some(UserSignal::PriceSensitive));
        for i in 0..2 {
            let (_, meta) = generator.generate(&result, &[], "u1", i);
            assert!(!meta.cta_added);
        }
    }

    #[test]
    fn test_acknowledgment_opens_the_reply() {
        let dir = docs_dir();
        let generator = generator(
            &dir,
            vec![Ok("Platform access arrives within a day after payment.".to_string())],
        );
        let mut result = success_result(None);
        result.message = Some("Great, the payment is in.".to_string());
        let (text, meta) = generator.generate(&result, &[], "u1", 0);
        assert!(text.starts_with("Great, the payment is in."));
        assert!(text.contains("Platform access"));
        assert_eq!(meta.intent, "business");
    }

    #[test]
    fn test_greeting_repair_applies() {
        let dir = docs_dir();
        let generator = generator(&dir, vec![Ok("Plans start at $49 a month.".to_string())]);
        let mut result = success_result(None);
        result.social_context = Some(SocialContext::Greeting);
        let (text, _) = generator.generate(&result, &[], "u1", 0);
        assert!(text.starts_with("Hello"));
    }

    #[test]
    fn test_clear_resets_streaks() {
        let dir = docs_dir();
        let generator = generator(
            &dir,
            vec![
                Ok("Plans start at $49.".to_string()),
                Ok("Plans start at $49.".to_string()),
            ],
        );
        let result = success_result(Some(UserSignal::PriceSensitive));
        let (_, meta) = generator.generate(&result, &[], "u1", 0);
        assert!(!meta.cta_added);
        generator.clear("u1");
        // Streak restarted at 1, so still no CTA
        let (_, meta) = generator.generate(&result, &[], "u1", 1);
        assert!(!meta.cta_added);
    }
}
