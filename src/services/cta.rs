//! CTA blocking and refusal tracking.
//!
//! Two regex-driven mutators scan incoming user text for completed-action
//! and refusal trigger phrases; `should_block` combines that state with the
//! policy thresholds. All state is process-lifetime, in-memory, per-user,
//! never persisted.
// Allow expect() on static regex patterns - these are guaranteed to compile
#![allow(clippy::expect_used)]

use crate::config::CtaPolicy;
use crate::models::CtaKind;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::{LazyLock, RwLock};

/// Tags for actions the user reports having completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionTag {
    /// Payment went through.
    Paid,
    /// Account / course registration done.
    Registered,
    /// Trial lesson attended.
    TrialCompleted,
    /// Application form submitted.
    FormFilled,
}

/// Kind of refusal the user expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefusalKind {
    /// "Stop suggesting" - blocks all CTAs for the long window.
    Hard,
    /// "I'll think about it" - blocks for the short window.
    Soft,
}

/// A block decision with its reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockDecision {
    /// Whether the CTA must be suppressed.
    pub blocked: bool,
    /// Why, when blocked.
    pub reason: Option<&'static str>,
}

impl BlockDecision {
    const fn allow() -> Self {
        Self {
            blocked: false,
            reason: None,
        }
    }

    const fn deny(reason: &'static str) -> Self {
        Self {
            blocked: true,
            reason: Some(reason),
        }
    }
}

#[derive(Debug, Default)]
struct UserCtaState {
    completed: HashSet<ActionTag>,
    refusal_count: u32,
    block_until_message: Option<usize>,
    last_refusal: Option<RefusalKind>,
}

static PAYMENT_DONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(already\s+paid|payment\s+went\s+through|just\s+paid|мы\s+оплатили|уже\s+оплатил|оплата\s+прошла)")
        .expect("static regex: payment done")
});

static REGISTERED_DONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(already\s+(registered|signed\s+up|enrolled)|we\s+registered|уже\s+(зарегистрировал|записал)ись?)")
        .expect("static regex: registered done")
});

static TRIAL_DONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(attended\s+the\s+trial|after\s+the\s+trial\s+lesson|были\s+на\s+пробном|после\s+пробного)")
        .expect("static regex: trial done")
});

static FORM_DONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(filled\s+(in|out)\s+the\s+form|sent\s+the\s+form|заполнил[аи]?\s+(анкету|форму))")
        .expect("static regex: form done")
});

static HARD_REFUSAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(stop\s+(suggesting|offering|pushing)|don'?t\s+offer|no\s+more\s+offers|хватит\s+предлагать|не\s+предлагайте)")
        .expect("static regex: hard refusal")
});

static SOFT_REFUSAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(i'?ll\s+think\s+about\s+it|maybe\s+later|not\s+right\s+now|я\s+подумаю|может\s+позже|пока\s+не\s+надо)")
        .expect("static regex: soft refusal")
});

/// Per-user CTA eligibility tracker.
pub struct CtaTracker {
    states: RwLock<HashMap<String, UserCtaState>>,
    policy: CtaPolicy,
}

impl CtaTracker {
    /// Creates a tracker with the given policy.
    #[must_use]
    pub fn new(policy: CtaPolicy) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            policy,
        }
    }

    /// Scans a user message for completed-action trigger phrases and records
    /// any match.
    pub fn check_completed_action(&self, user_id: &str, message: &str) {
        let tag = if PAYMENT_DONE.is_match(message) {
            Some(ActionTag::Paid)
        } else if REGISTERED_DONE.is_match(message) {
            Some(ActionTag::Registered)
        } else if TRIAL_DONE.is_match(message) {
            Some(ActionTag::TrialCompleted)
        } else if FORM_DONE.is_match(message) {
            Some(ActionTag::FormFilled)
        } else {
            None
        };
        if let Some(tag) = tag {
            tracing::debug!(user_id = %user_id, ?tag, "recorded completed action");
            self.record_action(user_id, tag);
        }
    }

    /// Records a completed action directly (used when the completed-action
    /// handler confirmed a family with school context).
    pub fn record_action(&self, user_id: &str, tag: ActionTag) {
        if let Ok(mut states) = self.states.write() {
            states.entry(user_id.to_string()).or_default().completed.insert(tag);
        }
    }

    /// Scans a user message for refusal phrases; a match blocks CTAs for the
    /// policy window and bumps the refusal count.
    pub fn check_refusal(&self, user_id: &str, message: &str, message_index: usize) {
        let (kind, window) = if HARD_REFUSAL.is_match(message) {
            (RefusalKind::Hard, self.policy.hard_refusal_block)
        } else if SOFT_REFUSAL.is_match(message) {
            (RefusalKind::Soft, self.policy.soft_refusal_block)
        } else {
            return;
        };

        tracing::debug!(user_id = %user_id, ?kind, window, "recorded CTA refusal");
        if let Ok(mut states) = self.states.write() {
            let state = states.entry(user_id.to_string()).or_default();
            state.refusal_count += 1;
            state.last_refusal = Some(kind);
            state.block_until_message = Some(message_index + window);
        }
    }

    /// Decides whether a CTA of the given kind must be suppressed.
    #[must_use]
    pub fn should_block(
        &self,
        user_id: &str,
        message_index: usize,
        kind: CtaKind,
    ) -> BlockDecision {
        let Ok(states) = self.states.read() else {
            return BlockDecision::allow();
        };
        let Some(state) = states.get(user_id) else {
            return BlockDecision::allow();
        };

        if let Some(until) = state.block_until_message {
            if message_index < until {
                return BlockDecision::deny("refusal window active");
            }
        }

        match kind {
            // Payment completion blocks purchase-nudging CTAs indefinitely
            CtaKind::Discount | CtaKind::SignUp if state.completed.contains(&ActionTag::Paid) => {
                BlockDecision::deny("user already paid")
            }
            CtaKind::SignUp if state.completed.contains(&ActionTag::Registered) => {
                BlockDecision::deny("user already registered")
            }
            _ => BlockDecision::allow(),
        }
    }

    /// Whether the user reported completing the given action.
    #[must_use]
    pub fn has_completed(&self, user_id: &str, tag: ActionTag) -> bool {
        self.states
            .read()
            .map(|states| {
                states
                    .get(user_id)
                    .is_some_and(|s| s.completed.contains(&tag))
            })
            .unwrap_or(false)
    }

    /// CTA frequency modifier for the user, from the policy ladder.
    #[must_use]
    pub fn frequency_modifier(&self, user_id: &str) -> f32 {
        let count = self
            .states
            .read()
            .ok()
            .and_then(|states| states.get(user_id).map(|s| s.refusal_count))
            .unwrap_or(0);
        self.policy.frequency_modifier(count)
    }

    /// Drops all tracked state for the user.
    pub fn clear(&self, user_id: &str) {
        if let Ok(mut states) = self.states.write() {
            states.remove(user_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> CtaTracker {
        CtaTracker::new(CtaPolicy::default())
    }

    #[test]
    fn test_payment_blocks_discount_indefinitely() {
        let t = tracker();
        t.check_completed_action("u1", "We already paid for the course yesterday");
        let decision = t.should_block("u1", 999, CtaKind::Discount);
        assert!(decision.blocked);
        assert_eq!(decision.reason, Some("user already paid"));
        // Trial CTAs are unaffected
        assert!(!t.should_block("u1", 999, CtaKind::Trial).blocked);
    }

    #[test]
    fn test_registration_blocks_signup() {
        let t = tracker();
        t.check_completed_action("u1", "we registered last week");
        assert!(t.should_block("u1", 5, CtaKind::SignUp).blocked);
        assert!(!t.should_block("u1", 5, CtaKind::Discount).blocked);
    }

    #[test]
    fn test_hard_refusal_blocks_seven_messages() {
        let t = tracker();
        t.check_refusal("u1", "please stop suggesting things", 10);
        assert!(t.should_block("u1", 12, CtaKind::Trial).blocked);
        assert!(t.should_block("u1", 16, CtaKind::Discount).blocked);
        // Window ends at index 17
        assert!(!t.should_block("u1", 17, CtaKind::Trial).blocked);
    }

    #[test]
    fn test_soft_refusal_blocks_three_messages() {
        let t = tracker();
        t.check_refusal("u1", "I'll think about it", 10);
        assert!(t.should_block("u1", 12, CtaKind::Trial).blocked);
        assert!(!t.should_block("u1", 13, CtaKind::Trial).blocked);
    }

    #[test]
    fn test_refusals_degrade_frequency_geometrically() {
        let t = tracker();
        assert!((t.frequency_modifier("u1") - 1.0).abs() < f32::EPSILON);
        t.check_refusal("u1", "maybe later", 1);
        assert!((t.frequency_modifier("u1") - 0.7).abs() < f32::EPSILON);
        t.check_refusal("u1", "я подумаю", 2);
        assert!((t.frequency_modifier("u1") - 0.4).abs() < f32::EPSILON);
        t.check_refusal("u1", "not right now", 3);
        assert!((t.frequency_modifier("u1") - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn test_non_trigger_text_is_ignored() {
        let t = tracker();
        t.check_completed_action("u1", "how much does the course cost?");
        t.check_refusal("u1", "tell me more please", 1);
        assert!(!t.should_block("u1", 2, CtaKind::Discount).blocked);
        assert!((t.frequency_modifier("u1") - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_clear_resets_user() {
        let t = tracker();
        t.check_completed_action("u1", "уже оплатили всё");
        t.clear("u1");
        assert!(!t.should_block("u1", 3, CtaKind::Discount).blocked);
    }

    #[test]
    fn test_state_is_per_user() {
        let t = tracker();
        t.check_completed_action("u1", "already paid");
        assert!(!t.should_block("u2", 3, CtaKind::Discount).blocked);
    }
}
