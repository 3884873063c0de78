//! The conversation pipeline: one entry point tying the intent pre-check,
//! router, completed-action handler, CTA tracking, generator, and the
//! per-user stores together.

use crate::config::EduchatConfig;
use crate::generator::ResponseGenerator;
use crate::intent::{self, SocialCategory};
use crate::llm::{provider_from_config, LlmProvider};
use crate::models::{ChatRequest, ChatResponse, SocialContext, Turn};
use crate::router::Router;
use crate::services::{Chooser, CompletedActionHandler, CtaTracker, RandomChooser};
use crate::storage::{DocumentStore, HistoryStore, Snapshot, SnapshotStore, SocialStateStore};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// Canned replies for pure social messages, rotated by the chooser.
const GREETING_REPLIES: &[&str] = &[
    "Hello, welcome to BrightKids. How can we help with courses, pricing, or enrollment?",
    "Hello. Happy to help with anything about BrightKids courses, schedule, or pricing.",
];

const REPEATED_GREETING_REPLIES: &[&str] = &[
    "Hello again. What else can we help with?",
    "Good to hear from you again. What would you like to know?",
];

const THANKS_REPLIES: &[&str] = &[
    "You're welcome. If anything else comes up about the courses, just write here.",
    "Glad it helped. We're here if you have more questions.",
];

const FAREWELL_REPLIES: &[&str] = &[
    "Goodbye, and thank you for writing to BrightKids. Come back any time.",
    "Take care. We'll be here whenever you have more questions.",
];

const APOLOGY_REPLIES: &[&str] = &[
    "No need to apologize at all. How can we help?",
    "It's completely fine. What can we do for you?",
];

/// Facade over the whole chat pipeline.
///
/// One instance serves all users; per-user state lives in the injected
/// stores, so tests can build an isolated service per case.
pub struct ChatService {
    history: Arc<HistoryStore>,
    social: Arc<SocialStateStore>,
    snapshots: Arc<SnapshotStore>,
    cta: Arc<CtaTracker>,
    completed: CompletedActionHandler,
    router: Router,
    generator: ResponseGenerator,
    chooser: Arc<dyn Chooser>,
    counts: RwLock<HashMap<String, usize>>,
}

impl ChatService {
    /// Builds a service from config with explicit providers and chooser.
    ///
    /// # Errors
    ///
    /// Returns an error if the document directory cannot be read or the
    /// snapshot directory cannot be created.
    pub fn new(
        config: &EduchatConfig,
        router_provider: Arc<dyn LlmProvider>,
        generator_provider: Arc<dyn LlmProvider>,
        chooser: Arc<dyn Chooser>,
    ) -> Result<Self> {
        let documents = Arc::new(DocumentStore::new(config.docs_dir.clone()));
        let history = Arc::new(HistoryStore::with_max_users(
            config.max_history_turns,
            config.max_tracked_users,
        ));
        let social = Arc::new(SocialStateStore::new(config.social_ttl_secs));
        let snapshots = Arc::new(SnapshotStore::new(
            config.data_dir.join("snapshots"),
            config.snapshot_max_age_secs,
            config.snapshot_max_bytes,
        )?);
        let cta = Arc::new(CtaTracker::new(config.cta.clone()));

        let completed = CompletedActionHandler::new(Arc::clone(&chooser), Arc::clone(&cta));
        let router = Router::new(router_provider, Arc::clone(&documents), Arc::clone(&social));
        let generator = ResponseGenerator::new(
            generator_provider,
            documents,
            Arc::clone(&cta),
            Arc::clone(&chooser),
            config.cta.clone(),
        );

        Ok(Self {
            history,
            social,
            snapshots,
            cta,
            completed,
            router,
            generator,
            chooser,
            counts: RwLock::new(HashMap::new()),
        })
    }

    /// Builds a service entirely from config, constructing real LLM clients.
    ///
    /// # Errors
    ///
    /// Returns an error if any store fails to initialize.
    pub fn from_config(config: &EduchatConfig) -> Result<Self> {
        let router_provider = provider_from_config(&config.router_llm);
        let generator_provider = provider_from_config(&config.generator_llm);
        Self::new(
            config,
            router_provider,
            generator_provider,
            Arc::new(RandomChooser::new()),
        )
    }

    /// Handles one user message through the full pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an empty user id or message.
    /// Everything downstream degrades to canned replies instead of failing.
    pub fn handle(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let user_id = request.user_id.trim();
        let message = request.message.trim();
        if user_id.is_empty() {
            return Err(Error::InvalidInput("empty user_id".to_string()));
        }
        if message.is_empty() {
            return Err(Error::InvalidInput("empty message".to_string()));
        }

        self.restore_if_first_touch(user_id);
        let message_index = self.next_message_index(user_id);

        // Pure social messages skip the model entirely
        if let Some(found) = intent::detect(message) {
            if found.category != SocialCategory::Unknown {
                debug!(user_id, category = ?found.category, confidence = found.confidence, "social pre-check hit");
                return Ok(self.social_reply(user_id, message, found.category, message_index));
            }
        }

        self.cta.check_completed_action(user_id, message);
        self.cta.check_refusal(user_id, message, message_index);

        let history = self.history.get(user_id);
        let result = self.router.route(message, &history, user_id);
        let result = self.completed.detect(message, result, &history, user_id);

        let (text, metadata) = self
            .generator
            .generate(&result, &history, user_id, message_index);

        self.history.push(user_id, Turn::user(message));
        self.history.push(user_id, Turn::assistant(&text));
        self.persist(user_id, result.user_signal, message_index + 1);

        info!(
            user_id,
            intent = %metadata.intent,
            cta_added = metadata.cta_added,
            documents = result.documents.len(),
            "message handled"
        );

        Ok(ChatResponse {
            response: text,
            intent: metadata.intent,
            user_signal: metadata.user_signal,
            social: result.social_context,
            decomposed_questions: result.decomposed_questions,
            relevant_documents: result.documents,
            cta_added: metadata.cta_added,
        })
    }

    /// Wipes every trace of a user: history, social state, CTA tracking,
    /// offer streaks, snapshot, and the message counter.
    pub fn clear_history(&self, user_id: &str) {
        self.history.clear(user_id);
        self.social.clear(user_id);
        self.cta.clear(user_id);
        self.generator.clear(user_id);
        self.snapshots.delete(user_id);
        if let Ok(mut counts) = self.counts.write() {
            counts.remove(user_id);
        }
        info!(user_id, "user state cleared");
    }

    /// Snapshots every tracked user to disk (shutdown path).
    pub fn persist_all(&self) {
        for user_id in self.history.user_ids() {
            // The counter was already incremented per handled message, so it
            // is the message count itself
            let count = self
                .counts
                .read()
                .ok()
                .and_then(|c| c.get(&user_id).copied())
                .unwrap_or(0);
            self.persist(&user_id, None, count);
        }
    }

    fn social_reply(
        &self,
        user_id: &str,
        message: &str,
        category: SocialCategory,
        message_index: usize,
    ) -> ChatResponse {
        let (intent, pool, social) = match category {
            SocialCategory::Greeting => {
                if self.social.get(user_id).greeting_exchanged {
                    (
                        "social_repeated_greeting",
                        REPEATED_GREETING_REPLIES,
                        Some(SocialContext::RepeatedGreeting),
                    )
                } else {
                    self.social.mark_greeting(user_id);
                    ("social_greeting", GREETING_REPLIES, Some(SocialContext::Greeting))
                }
            }
            SocialCategory::Thanks => ("social_thanks", THANKS_REPLIES, Some(SocialContext::Thanks)),
            SocialCategory::Farewell => {
                self.social.mark_farewell(user_id);
                ("social_farewell", FAREWELL_REPLIES, Some(SocialContext::Farewell))
            }
            SocialCategory::Apology | SocialCategory::Unknown => {
                ("social_apology", APOLOGY_REPLIES, Some(SocialContext::Apology))
            }
        };
        let text = pool[self.chooser.pick(pool.len())].to_string();

        self.history.push(user_id, Turn::user(message));
        self.history.push(user_id, Turn::assistant(&text));
        self.persist(user_id, None, message_index + 1);

        ChatResponse {
            response: text,
            intent: intent.to_string(),
            user_signal: None,
            social,
            decomposed_questions: Vec::new(),
            relevant_documents: Vec::new(),
            cta_added: false,
        }
    }

    /// Restores a user's snapshot the first time this process sees them.
    fn restore_if_first_touch(&self, user_id: &str) {
        if self.history.contains(user_id) {
            return;
        }
        let already_counted = self
            .counts
            .read()
            .is_ok_and(|c| c.contains_key(user_id));
        if already_counted {
            return;
        }
        let Some(snapshot) = self.snapshots.load(user_id) else {
            return;
        };
        debug!(
            user_id,
            turns = snapshot.history.len(),
            message_count = snapshot.message_count,
            "restored snapshot"
        );
        self.history.replace(user_id, snapshot.history);
        self.social
            .restore_greeting(user_id, snapshot.greeting_exchanged);
        if let Ok(mut counts) = self.counts.write() {
            counts.insert(user_id.to_string(), snapshot.message_count);
        }
    }

    /// Increments and returns the per-user message index.
    fn next_message_index(&self, user_id: &str) -> usize {
        let Ok(mut counts) = self.counts.write() else {
            return 0;
        };
        let count = counts.entry(user_id.to_string()).or_insert(0);
        let index = *count;
        *count += 1;
        index
    }

    fn persist(
        &self,
        user_id: &str,
        user_signal: Option<crate::models::UserSignal>,
        message_count: usize,
    ) {
        let snapshot = Snapshot {
            history: self.history.get(user_id),
            user_signal,
            greeting_exchanged: self.social.get(user_id).greeting_exchanged,
            message_count,
        };
        self.snapshots.save(user_id, &snapshot);
    }
}
