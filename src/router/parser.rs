//! Router response parsing and repair.
//!
//! The classification model returns freeform text that should contain one
//! JSON object. Parsing produces a tagged outcome; repairs are an explicit,
//! ordered list of pure transforms over the parsed structure, each
//! independently testable. The caller (`Router::route`) decides where the
//! one permitted retry slots in between the transforms.

use crate::llm::extract_json_from_response;
use crate::models::{RouterResult, RouterStatus, SocialContext, UserSignal};
use serde::Deserialize;
use serde_json::Value;

use super::{MAX_DOCUMENTS, MAX_SUCCESS_QUESTIONS, OFFTOPIC_MESSAGE, SIMPLIFICATION_MESSAGE};

/// Outcome of parsing a router model response.
#[derive(Debug)]
pub enum ParseOutcome {
    /// A structurally valid result (repairs may still apply).
    Parsed(RouterResult),
    /// The response had JSON but violated the schema.
    SchemaError(String),
    /// The response was empty or contained no JSON object.
    EmptyResponse,
}

/// Raw wire shape, deliberately loose: every field optional, questions as an
/// untyped value so a malformed list degrades instead of failing the parse.
#[derive(Debug, Default, Deserialize)]
struct RawRouterResponse {
    status: Option<String>,
    #[serde(default)]
    documents: Option<Value>,
    #[serde(default)]
    decomposed_questions: Option<Value>,
    #[serde(default)]
    user_signal: Option<String>,
    #[serde(default)]
    social_context: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Parses a model response into a `RouterResult`.
///
/// Applies repair steps 1-3: fence stripping, status/user_signal remap, and
/// question-list defaulting.
#[must_use]
pub fn parse_router_response(response: &str, original_message: &str) -> ParseOutcome {
    if response.trim().is_empty() {
        return ParseOutcome::EmptyResponse;
    }

    let json = extract_json_from_response(response);
    let raw: RawRouterResponse = match serde_json::from_str(json) {
        Ok(raw) => raw,
        Err(err) => return ParseOutcome::SchemaError(format!("invalid JSON: {err}")),
    };

    let Some(status_str) = raw.status.as_deref() else {
        return ParseOutcome::SchemaError("missing status field".to_string());
    };

    // The model sometimes confuses the status and user_signal enums; a
    // signal value in the status slot means it classified successfully and
    // reported the signal in the wrong place.
    let (status, remapped_signal) = match RouterStatus::parse(status_str) {
        Some(status) => (status, None),
        None => match UserSignal::parse(status_str) {
            Some(signal) => (RouterStatus::Success, Some(signal)),
            None => {
                return ParseOutcome::SchemaError(format!("invalid status: {status_str}"));
            }
        },
    };

    ParseOutcome::Parsed(RouterResult {
        status,
        documents: string_list(raw.documents.as_ref()),
        decomposed_questions: string_list(raw.decomposed_questions.as_ref()),
        user_signal: remapped_signal
            .or_else(|| raw.user_signal.as_deref().and_then(UserSignal::parse)),
        social_context: raw.social_context.as_deref().and_then(SocialContext::parse),
        message: raw.message.filter(|m| !m.trim().is_empty()),
        original_message: original_message.to_string(),
    })
}

/// Coerces an untyped JSON value into a list of non-empty strings.
/// Anything malformed becomes the empty list.
fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

/// Step 4: a `success` with more than 3 questions becomes
/// `need_simplification` with a canned message and no documents.
#[must_use]
pub fn downgrade_overlong_success(mut result: RouterResult) -> RouterResult {
    if result.status == RouterStatus::Success
        && result.decomposed_questions.len() > MAX_SUCCESS_QUESTIONS
    {
        tracing::debug!(
            questions = result.decomposed_questions.len(),
            "downgrading overlong success to need_simplification"
        );
        result.status = RouterStatus::NeedSimplification;
        result.documents.clear();
        result.message = Some(SIMPLIFICATION_MESSAGE.to_string());
    }
    result
}

/// Whether the one corrective retry applies: `need_simplification` with a
/// question count that does not justify it.
#[must_use]
pub fn needs_simplification_retry(result: &RouterResult) -> bool {
    result.status == RouterStatus::NeedSimplification
        && (1..=MAX_SUCCESS_QUESTIONS).contains(&result.decomposed_questions.len())
}

/// Step 6 (final override): a surviving `need_simplification` with 3 or
/// fewer questions is forced to `success`, with documents assigned by
/// keyword match against the message.
#[must_use]
pub fn override_unsupported_simplification(
    mut result: RouterResult,
    known_ids: &[&str],
) -> RouterResult {
    if !needs_simplification_retry(&result) {
        return result;
    }
    tracing::debug!("forcing need_simplification with few questions back to success");
    result.status = RouterStatus::Success;
    result.message = None;
    if result.documents.is_empty() {
        result.documents = fallback_documents(&result.original_message, known_ids);
    }
    result
}

/// Keyword-matched fallback document set, intersected with the known corpus.
#[must_use]
pub fn fallback_documents(message: &str, known_ids: &[&str]) -> Vec<String> {
    let lower = message.to_lowercase();
    let candidates: &[&str] = if ["price", "cost", "pay", "цен", "стоимост", "оплат"]
        .iter()
        .any(|k| lower.contains(k))
    {
        &["pricing.md"]
    } else if ["partner", "franchise", "партнер"]
        .iter()
        .any(|k| lower.contains(k))
    {
        &["partners.md"]
    } else {
        &["faq.md"]
    };
    candidates
        .iter()
        .filter(|c| known_ids.contains(*c))
        .map(|c| (*c).to_string())
        .collect()
}

/// Step 7: for `success`, documents are deduplicated preserving order and
/// capped at 4. An empty list afterwards forces a downgrade to `offtopic`
/// with the canned message - never answer with zero grounding documents.
#[must_use]
pub fn enforce_document_invariants(mut result: RouterResult) -> RouterResult {
    if result.status != RouterStatus::Success {
        return result;
    }
    let mut seen = Vec::with_capacity(result.documents.len());
    for doc in result.documents.drain(..) {
        if !seen.contains(&doc) {
            seen.push(doc);
        }
    }
    seen.truncate(MAX_DOCUMENTS);
    result.documents = seen;

    if result.documents.is_empty() {
        tracing::debug!("success with no documents, downgrading to offtopic");
        let mut downgraded =
            RouterResult::offtopic(result.original_message.clone(), OFFTOPIC_MESSAGE);
        downgraded.user_signal = result.user_signal;
        downgraded.social_context = result.social_context;
        return downgraded;
    }
    result
}

/// Step 8: offtopic always carries the canned reply; `need_simplification`
/// must carry a non-empty message or the whole response is invalid
/// (`None` tells the caller to use the fixed fallback). Success replies are
/// generated, so any message the model attached there is dropped - after
/// this step a success result carrying a message can only have come from
/// the completed-action rewrite.
#[must_use]
pub fn validate_reply_message(mut result: RouterResult) -> Option<RouterResult> {
    match result.status {
        RouterStatus::Offtopic => {
            result.message = Some(OFFTOPIC_MESSAGE.to_string());
            Some(result)
        }
        RouterStatus::NeedSimplification => {
            if result.message.as_deref().is_none_or(|m| m.trim().is_empty()) {
                return None;
            }
            Some(result)
        }
        RouterStatus::Success => {
            result.message = None;
            Some(result)
        }
    }
}
