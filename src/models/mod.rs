//! Core domain types for the chat pipeline.

use serde::{Deserialize, Serialize};

/// Who produced a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user.
    User,
    /// The assistant.
    Assistant,
}

impl Role {
    /// Returns the string form of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    /// Parses a role string, defaulting unknown values to `User`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "assistant" => Self::Assistant,
            _ => Self::User,
        }
    }
}

/// A single conversation turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    /// Who spoke.
    pub role: Role,
    /// What was said.
    pub content: String,
}

impl Turn {
    /// Creates a user turn.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Creates an assistant turn.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Classification outcome for a user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouterStatus {
    /// The message is answerable from the knowledge documents.
    Success,
    /// The message is outside the business domain.
    Offtopic,
    /// The message packs too many questions to answer in one reply.
    NeedSimplification,
}

impl RouterStatus {
    /// Returns the string form of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Offtopic => "offtopic",
            Self::NeedSimplification => "need_simplification",
        }
    }

    /// Parses a status string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "success" => Some(Self::Success),
            "offtopic" | "off_topic" => Some(Self::Offtopic),
            "need_simplification" | "need-simplification" => Some(Self::NeedSimplification),
            _ => None,
        }
    }
}

/// Coarse intent / emotional-state label driving tone and CTA policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserSignal {
    /// The user keeps steering toward cost.
    PriceSensitive,
    /// The user worries whether the course suits their child.
    AnxietyAboutChild,
    /// The user states readiness to enroll or pay.
    ReadyToBuy,
    /// The user is browsing without commitment cues.
    ExploringOnly,
}

impl UserSignal {
    /// Returns the string form of the signal.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PriceSensitive => "price_sensitive",
            Self::AnxietyAboutChild => "anxiety_about_child",
            Self::ReadyToBuy => "ready_to_buy",
            Self::ExploringOnly => "exploring_only",
        }
    }

    /// Parses a signal string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "price_sensitive" => Some(Self::PriceSensitive),
            "anxiety_about_child" => Some(Self::AnxietyAboutChild),
            "ready_to_buy" => Some(Self::ReadyToBuy),
            "exploring_only" => Some(Self::ExploringOnly),
            _ => None,
        }
    }
}

/// A conversational courtesy act detected alongside the business
/// classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocialContext {
    /// First greeting this session.
    Greeting,
    /// A greeting when one was already exchanged this session.
    RepeatedGreeting,
    /// Thanks.
    Thanks,
    /// Farewell.
    Farewell,
    /// Apology.
    Apology,
}

impl SocialContext {
    /// Returns the string form of the context.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::RepeatedGreeting => "repeated_greeting",
            Self::Thanks => "thanks",
            Self::Farewell => "farewell",
            Self::Apology => "apology",
        }
    }

    /// Parses a social context string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "greeting" => Some(Self::Greeting),
            "repeated_greeting" => Some(Self::RepeatedGreeting),
            "thanks" | "gratitude" => Some(Self::Thanks),
            "farewell" | "goodbye" => Some(Self::Farewell),
            "apology" => Some(Self::Apology),
            _ => None,
        }
    }
}

/// Structured decision produced by the router stage.
///
/// Invariants maintained by the repair pipeline:
/// - `Success` carries 1..=4 pairwise-distinct documents and 1..=3 questions
/// - `NeedSimplification` carries 4+ questions
/// - non-success statuses carry a ready-to-send `message`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouterResult {
    /// Classification status.
    pub status: RouterStatus,
    /// Selected knowledge document identifiers, ordered, deduplicated.
    pub documents: Vec<String>,
    /// Atomic sub-questions extracted from the message.
    pub decomposed_questions: Vec<String>,
    /// Detected user intent / emotional state.
    pub user_signal: Option<UserSignal>,
    /// Detected conversational courtesy act.
    pub social_context: Option<SocialContext>,
    /// Canned reply text for non-success statuses.
    pub message: Option<String>,
    /// The raw user input this result was produced for.
    pub original_message: String,
}

impl RouterResult {
    /// Creates an offtopic result with a canned reply.
    #[must_use]
    pub fn offtopic(original_message: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: RouterStatus::Offtopic,
            documents: Vec::new(),
            decomposed_questions: Vec::new(),
            user_signal: None,
            social_context: None,
            message: Some(message.into()),
            original_message: original_message.into(),
        }
    }
}

/// The kind of call-to-action woven into a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CtaKind {
    /// Discount or promo code offer.
    Discount,
    /// Free trial lesson offer.
    Trial,
    /// Sign-up / enrollment nudge.
    SignUp,
}

impl CtaKind {
    /// Returns the string form of the CTA kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Discount => "discount",
            Self::Trial => "trial",
            Self::SignUp => "sign_up",
        }
    }
}

/// Metadata the generator returns alongside the reply text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationMetadata {
    /// Pipeline intent label (e.g. "business", "social_greeting", "fallback").
    pub intent: String,
    /// The user signal the reply was toned for.
    pub user_signal: Option<UserSignal>,
    /// Whether a CTA was added to the reply.
    pub cta_added: bool,
    /// The kind of CTA that was added, if any.
    pub cta_kind: Option<CtaKind>,
    /// Whether the reply contains generated humor. Reserved; the current
    /// prompt forbids jokes, so this stays false.
    pub humor_generated: bool,
}

/// Inbound chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Caller-assigned user identifier.
    pub user_id: String,
    /// The user's message.
    pub message: String,
}

/// Outbound chat response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Final reply text.
    pub response: String,
    /// Pipeline intent label.
    pub intent: String,
    /// Detected user signal, if any.
    pub user_signal: Option<UserSignal>,
    /// Detected social context, if any.
    pub social: Option<SocialContext>,
    /// Sub-questions the router extracted.
    pub decomposed_questions: Vec<String>,
    /// Documents the reply was grounded on.
    pub relevant_documents: Vec<String>,
    /// Whether a CTA was woven into the reply.
    pub cta_added: bool,
}
