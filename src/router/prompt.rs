//! Router prompt assembly.
//!
//! Builds the fixed system segment and the per-request user segment
//! (document summaries, trimmed history with signal-carryover hints, worked
//! examples, the current message).

use crate::models::{Role, Turn};
use crate::storage::DocumentSummary;

/// How many trailing turns of history the router sees.
pub const HISTORY_WINDOW: usize = 10;

/// Fixed system segment for the classification model.
pub const ROUTER_SYSTEM_PROMPT: &str = r#"You are the routing stage of a customer-support assistant for BrightKids, an online programming school for children aged 6-14.

Work in two stages.

Stage 1 - decompose. Split the user's message into atomic sub-questions. A message may contain one question, several, or none.

Stage 2 - classify. Choose exactly one status:
- "success": the message can be answered from the knowledge documents listed in the request. Requires 1 to 3 sub-questions and 1 to 4 supporting documents.
- "offtopic": the message is unrelated to the school (weather, politics, other products). Do not write an answer for it.
- "need_simplification": the message packs 4 or more sub-questions; answering all at once would be unreadable.

Rules:
- Never select more than 4 documents, never more than 3 sub-questions for "success".
- Skeptical or doubting questions about the school ("is this worth the money?", "do kids actually learn anything?") are on-topic: classify them "success" and pick documents that address the doubt.
- Detect the user's signal when evident: "price_sensitive", "anxiety_about_child", "ready_to_buy", or "exploring_only".
- Detect a social act when present: "greeting", "thanks", "farewell", "apology".

Respond with a single JSON object and nothing else:
{"status": "...", "decomposed_questions": ["..."], "documents": ["..."], "user_signal": "... or null", "social_context": "... or null", "message": "only for need_simplification"}"#;

/// Corrective re-prompt sent when the model returned `need_simplification`
/// with 3 or fewer questions.
pub const ROUTER_CORRECTION_PROMPT: &str = r#"Your previous classification used status "need_simplification", but it listed 3 or fewer sub-questions. That status is only valid for 4 or more. Re-classify the same message with status "success", keep the sub-questions, and select 1 to 4 supporting documents. Respond with the JSON object only."#;

/// Keywords suggesting the prior assistant turn was about pricing.
const PRICE_HINTS: &[&str] = &["price", "cost", "tariff", "plan", "payment", "цен", "стоимост", "тариф", "оплат"];

/// Keywords suggesting the prior assistant turn was about courses.
const COURSE_HINTS: &[&str] = &["course", "lesson", "program", "curriculum", "курс", "урок", "занят", "программ"];

/// Rewrites an ultra-short follow-up ("a?", "and?") into an expanded
/// question inferred from the prior assistant turn.
///
/// Returns `None` when the message is substantial enough to route as-is.
#[must_use]
pub fn expand_short_followup(message: &str, history: &[Turn]) -> Option<String> {
    let trimmed = message.trim();
    let word_chars = trimmed.chars().filter(|c| c.is_alphanumeric()).count();
    if word_chars > 3 || trimmed.is_empty() {
        return None;
    }

    let last_assistant = history
        .iter()
        .rev()
        .find(|t| t.role == Role::Assistant)
        .map(|t| t.content.to_lowercase())
        .unwrap_or_default();

    if PRICE_HINTS.iter().any(|h| last_assistant.contains(h)) {
        Some("Could you tell me more about the price and payment options?".to_string())
    } else if COURSE_HINTS.iter().any(|h| last_assistant.contains(h)) {
        Some("Could you tell me more about the courses and who they suit?".to_string())
    } else {
        Some("Could you expand on what you just said?".to_string())
    }
}

/// Builds the user segment of the router prompt.
#[must_use]
pub fn build_user_prompt(
    message: &str,
    history: &[Turn],
    summaries: &[DocumentSummary],
) -> String {
    let docs_json = serde_json::to_string_pretty(
        &summaries
            .iter()
            .map(|s| serde_json::json!({"id": s.id, "summary": s.summary}))
            .collect::<Vec<_>>(),
    )
    .unwrap_or_else(|_| "[]".to_string());

    let mut prompt = String::with_capacity(2048);
    prompt.push_str("Knowledge documents:\n");
    prompt.push_str(&docs_json);
    prompt.push_str("\n\n");

    let window: Vec<&Turn> = history
        .iter()
        .rev()
        .take(HISTORY_WINDOW)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if window.is_empty() {
        prompt.push_str("Conversation history: (none)\n");
    } else {
        prompt.push_str("Conversation history:\n");
        for turn in &window {
            prompt.push_str(turn.role.as_str());
            prompt.push_str(": ");
            prompt.push_str(&turn.content);
            prompt.push('\n');
        }
        if let Some(hint) = carryover_hint(&window) {
            prompt.push_str(hint);
            prompt.push('\n');
        }
    }

    prompt.push_str("\nWorked examples:\n");
    prompt.push_str(WORKED_EXAMPLES);

    prompt.push_str("\nCurrent message: ");
    prompt.push_str(message);
    prompt
}

/// A light signal-carryover hint derived from earlier user turns, so the
/// model keeps tone context without re-reading the whole dialog.
fn carryover_hint(window: &[&Turn]) -> Option<&'static str> {
    let user_text: String = window
        .iter()
        .filter(|t| t.role == Role::User)
        .map(|t| t.content.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    if PRICE_HINTS.iter().any(|h| user_text.contains(h)) {
        Some("(note: earlier turns show interest in pricing)")
    } else if user_text.contains("worried") || user_text.contains("переживаю") {
        Some("(note: earlier turns show worry about the child)")
    } else {
        None
    }
}

/// Two worked examples keep the output format honest on small models.
const WORKED_EXAMPLES: &str = r#"Message: "Hello! Do you have courses for a 10-year-old and what's the price?"
Output: {"status": "success", "decomposed_questions": ["Are there courses suitable for a 10-year-old?", "What do the courses cost?"], "documents": ["courses.md", "pricing.md"], "user_signal": "exploring_only", "social_context": "greeting", "message": null}

Message: "What's the best pizza place nearby?"
Output: {"status": "offtopic", "decomposed_questions": [], "documents": [], "user_signal": null, "social_context": null, "message": null}
"#;
