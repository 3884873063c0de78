//! Classification stage: decides whether/how to answer and which documents
//! are relevant.
//!
//! Wraps the router model call with strict prompts, a parse/repair pipeline,
//! one corrective retry, and a fixed fallback. Callers never see a raw error
//! from this component.

mod parser;
mod prompt;

pub use parser::{
    downgrade_overlong_success, enforce_document_invariants, fallback_documents,
    needs_simplification_retry, override_unsupported_simplification, parse_router_response,
    validate_reply_message, ParseOutcome,
};
pub use prompt::{build_user_prompt, expand_short_followup, ROUTER_SYSTEM_PROMPT};

use crate::llm::{ChatMessage, LlmProvider, SamplingParams};
use crate::models::{RouterResult, RouterStatus, SocialContext, Turn};
use crate::storage::{DocumentStore, SocialStateStore};
use std::sync::Arc;

/// Hard cap on documents per result.
pub const MAX_DOCUMENTS: usize = 4;

/// Maximum sub-questions a `success` result may carry.
pub const MAX_SUCCESS_QUESTIONS: usize = 3;

/// Canned reply for offtopic messages. Never model-generated.
pub const OFFTOPIC_MESSAGE: &str = "That's a bit outside what we can help with here. We answer questions about BrightKids courses, pricing, schedule, and enrollment. What would you like to know?";

/// Canned reply when a message packs too many questions.
pub const SIMPLIFICATION_MESSAGE: &str = "That's quite a few questions at once. Let's take them one or two at a time so nothing gets lost. Which one matters most right now?";

/// Canned reply when the classification stage fails entirely.
pub const FALLBACK_MESSAGE: &str = "Sorry, we didn't quite catch that. Could you rephrase your question about our courses or pricing?";

/// The classification stage.
pub struct Router {
    provider: Arc<dyn LlmProvider>,
    documents: Arc<DocumentStore>,
    social: Arc<SocialStateStore>,
}

impl Router {
    /// Creates a router over the given provider and stores.
    #[must_use]
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        documents: Arc<DocumentStore>,
        social: Arc<SocialStateStore>,
    ) -> Self {
        Self {
            provider,
            documents,
            social,
        }
    }

    /// Classifies a message.
    ///
    /// Any model failure, parse failure, or schema violation degrades to the
    /// fixed fallback result - a soft failure, never a crash.
    #[must_use]
    pub fn route(&self, message: &str, history: &[Turn], user_id: &str) -> RouterResult {
        let effective = expand_short_followup(message, history)
            .inspect(|expanded| {
                tracing::debug!(original = %message, expanded = %expanded, "expanded short follow-up");
            })
            .unwrap_or_else(|| message.to_string());

        let user_prompt = build_user_prompt(&effective, history, self.documents.summaries());
        let params = SamplingParams {
            temperature: Some(0.2),
            max_tokens: Some(512),
        };

        let response = match self
            .provider
            .complete_with_system(ROUTER_SYSTEM_PROMPT, &user_prompt, &params)
        {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(error = %err, "router model call failed, using fallback");
                return Self::fallback(message);
            }
        };

        let mut result = match parse_router_response(&response, message) {
            ParseOutcome::Parsed(result) => result,
            ParseOutcome::SchemaError(reason) => {
                tracing::warn!(reason = %reason, "router response failed schema, using fallback");
                return Self::fallback(message);
            }
            ParseOutcome::EmptyResponse => {
                tracing::warn!("router returned empty response, using fallback");
                return Self::fallback(message);
            }
        };

        result = downgrade_overlong_success(result);

        // One corrective retry when the model under-justified
        // need_simplification; accept the retry only if it parses clean.
        if needs_simplification_retry(&result) {
            if let Some(corrected) = self.retry_for_success(&user_prompt, &response, message) {
                result = corrected;
            }
        }

        let known = self.documents.known_ids();
        result = override_unsupported_simplification(result, &known);
        result = enforce_document_invariants(result);
        let Some(mut result) = validate_reply_message(result) else {
            return Self::fallback(message);
        };

        // Social touch-up: a greeting when one already happened this session
        // becomes repeated_greeting; the store is updated on first greeting
        // only.
        if result.status == RouterStatus::Success
            && result.social_context == Some(SocialContext::Greeting)
        {
            if self.social.get(user_id).greeting_exchanged {
                result.social_context = Some(SocialContext::RepeatedGreeting);
            } else {
                self.social.mark_greeting(user_id);
            }
        }

        result
    }

    /// Issues the single corrective re-prompt demanding `success`.
    fn retry_for_success(
        &self,
        user_prompt: &str,
        previous_response: &str,
        original_message: &str,
    ) -> Option<RouterResult> {
        let messages = vec![
            ChatMessage::system(ROUTER_SYSTEM_PROMPT),
            ChatMessage::user(user_prompt),
            ChatMessage::assistant(previous_response),
            ChatMessage::user(prompt::ROUTER_CORRECTION_PROMPT),
        ];
        let params = SamplingParams {
            temperature: Some(0.2),
            max_tokens: Some(512),
        };

        let response = match self.provider.complete(&messages, &params) {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(error = %err, "correction retry failed");
                return None;
            }
        };

        match parse_router_response(&response, original_message) {
            ParseOutcome::Parsed(result) => {
                tracing::debug!(status = result.status.as_str(), "correction retry accepted");
                Some(result)
            }
            _ => {
                tracing::debug!("correction retry rejected, keeping first result");
                None
            }
        }
    }

    /// The fixed fallback result for any hard failure.
    fn fallback(message: &str) -> RouterResult {
        RouterResult::offtopic(message, FALLBACK_MESSAGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatRole;
    use crate::Result;
    use std::sync::Mutex;

    /// Scripted provider: pops responses front to back.
    struct ScriptedProvider {
        responses: Mutex<Vec<Result<String>>>,
        calls: Mutex<Vec<Vec<(ChatRole, String)>>>,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<Result<String>>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl LlmProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn complete(&self, messages: &[ChatMessage], _params: &SamplingParams) -> Result<String> {
            self.calls.lock().unwrap().push(
                messages
                    .iter()
                    .map(|m| (m.role, m.content.clone()))
                    .collect(),
            );
            let mut responses = self.responses.lock().unwrap();
            if responses.is_empty() {
                Err(crate::Error::OperationFailed {
                    operation: "scripted".to_string(),
                    cause: "script exhausted".to_string(),
                })
            } else {
                responses.remove(0)
            }
        }
    }

    fn router_with(
        responses: Vec<Result<String>>,
        docs: &[(&str, &str)],
    ) -> (Router, tempfile::TempDir, Arc<ScriptedProvider>) {
        let dir = tempfile::tempdir().unwrap();
        for (name, body) in docs {
            std::fs::write(dir.path().join(name), body).unwrap();
        }
        let provider = Arc::new(ScriptedProvider::new(responses));
        let router = Router::new(
            provider.clone(),
            Arc::new(DocumentStore::new(dir.path())),
            Arc::new(SocialStateStore::new(3600)),
        );
        (router, dir, provider)
    }

    const DOCS: &[(&str, &str)] = &[
        ("pricing.md", "Plans from $49."),
        ("courses.md", "Scratch and Python."),
        ("faq.md", "Common questions."),
    ];

    #[test]
    fn test_route_success() {
        let (router, _dir, _) = router_with(
            vec![Ok(r#"{"status": "success", "documents": ["courses.md"], "decomposed_questions": ["what courses?"]}"#.to_string())],
            DOCS,
        );
        let result = router.route("what courses do you have?", &[], "u1");
        assert_eq!(result.status, RouterStatus::Success);
        assert_eq!(result.documents, vec!["courses.md"]);
    }

    #[test]
    fn test_provider_error_yields_fallback() {
        let (router, _dir, _) = router_with(
            vec![Err(crate::Error::OperationFailed {
                operation: "x".to_string(),
                cause: "timeout".to_string(),
            })],
            DOCS,
        );
        let result = router.route("hello", &[], "u1");
        assert_eq!(result.status, RouterStatus::Offtopic);
        assert_eq!(result.message.as_deref(), Some(FALLBACK_MESSAGE));
    }

    #[test]
    fn test_garbage_response_yields_fallback() {
        let (router, _dir, _) = router_with(vec![Ok("no json here at all".to_string())], DOCS);
        let result = router.route("hello", &[], "u1");
        assert_eq!(result.message.as_deref(), Some(FALLBACK_MESSAGE));
    }

    #[test]
    fn test_simplification_retry_accepts_success() {
        let (router, _dir, provider) = router_with(
            vec![
                Ok(r#"{"status": "need_simplification", "decomposed_questions": ["q1", "q2"]}"#
                    .to_string()),
                Ok(r#"{"status": "success", "documents": ["faq.md"], "decomposed_questions": ["q1", "q2"]}"#
                    .to_string()),
            ],
            DOCS,
        );
        let result = router.route("two things", &[], "u1");
        assert_eq!(result.status, RouterStatus::Success);
        assert_eq!(result.documents, vec!["faq.md"]);
        // Exactly one retry happened, with the correction as the last turn
        let calls = provider.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].last().unwrap().0, ChatRole::User);
        assert!(calls[1].last().unwrap().1.contains("need_simplification"));
    }

    #[test]
    fn test_simplification_retry_failure_triggers_override() {
        let (router, _dir, _) = router_with(
            vec![
                Ok(r#"{"status": "need_simplification", "decomposed_questions": ["how much?"]}"#
                    .to_string()),
                Ok("still not json".to_string()),
            ],
            DOCS,
        );
        let result = router.route("how much does it cost?", &[], "u1");
        // Final override forces success with keyword-matched documents
        assert_eq!(result.status, RouterStatus::Success);
        assert_eq!(result.documents, vec!["pricing.md"]);
    }

    #[test]
    fn test_success_without_documents_becomes_offtopic() {
        let (router, _dir, _) = router_with(
            vec![Ok(
                r#"{"status": "success", "documents": [], "decomposed_questions": ["q"]}"#
                    .to_string(),
            )],
            DOCS,
        );
        let result = router.route("hmm", &[], "u1");
        assert_eq!(result.status, RouterStatus::Offtopic);
        assert_eq!(result.message.as_deref(), Some(OFFTOPIC_MESSAGE));
    }

    #[test]
    fn test_repeated_greeting_rewrite() {
        let success =
            r#"{"status": "success", "documents": ["courses.md"], "decomposed_questions": ["q"], "social_context": "greeting"}"#;
        let (router, _dir, _) = router_with(
            vec![Ok(success.to_string()), Ok(success.to_string())],
            DOCS,
        );
        let first = router.route("Hello! Courses?", &[], "u1");
        assert_eq!(first.social_context, Some(SocialContext::Greeting));
        let second = router.route("Hello again! Price?", &[], "u1");
        assert_eq!(second.social_context, Some(SocialContext::RepeatedGreeting));
    }

    #[test]
    fn test_greeting_state_is_per_user() {
        let success =
            r#"{"status": "success", "documents": ["courses.md"], "decomposed_questions": ["q"], "social_context": "greeting"}"#;
        let (router, _dir, _) = router_with(
            vec![Ok(success.to_string()), Ok(success.to_string())],
            DOCS,
        );
        let _ = router.route("Hello!", &[], "u1");
        let other = router.route("Hello!", &[], "u2");
        assert_eq!(other.social_context, Some(SocialContext::Greeting));
    }
}
