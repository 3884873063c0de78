//! Prompt assembly for the response generator model.

use crate::models::{CtaKind, RouterResult, Turn, UserSignal};

/// How many history turns the generator sees.
pub const HISTORY_WINDOW: usize = 10;

/// Persona and style rules shared by every generation call.
pub const GENERATOR_SYSTEM_PROMPT: &str = r#"You are a support manager at BrightKids, an online school teaching programming and digital skills to children aged 7-15.

Voice and style:
- Warm, calm, concrete. A knowledgeable person, not a brochure.
- Answer ONLY from the reference documents provided. Never invent prices, dates, teacher names, or policies.
- Plain prose, no markdown headings, no bullet lists, no numbered lists.
- No exclamation marks.
- Do not repeat the parent's question back to them.
- Do not end with generic offers of further help ("feel free to reach out").
- Answer every decomposed question in one flowing reply.
- Keep the reply between 100 and 150 words.

If the documents do not cover something, say the manager will confirm that detail, and answer the parts you can."#;

/// Per-signal tone guidance appended to the system prompt.
#[must_use]
pub fn tone_block(signal: Option<UserSignal>) -> &'static str {
    match signal {
        Some(UserSignal::PriceSensitive) => {
            "Tone: the parent is watching the budget. Lead with concrete prices and what is included, mention the cheaper formats first, never pressure."
        }
        Some(UserSignal::AnxietyAboutChild) => {
            "Tone: the parent is worried about their child. Reassure first, describe how teachers support beginners and shy kids, keep facts gentle and specific."
        }
        Some(UserSignal::ReadyToBuy) => {
            "Tone: the parent is ready to enroll. Be direct and practical, lay out the exact next steps without a sales pitch."
        }
        Some(UserSignal::ExploringOnly) => {
            "Tone: the parent is just looking around. Inform without selling, give a broad picture, leave the door open."
        }
        None => "Tone: neutral and helpful.",
    }
}

/// Instruction block asking the model to weave in a call to action.
#[must_use]
pub fn cta_block(kind: CtaKind, at_start: bool) -> String {
    let (what, example) = match kind {
        CtaKind::Discount => (
            "mention the current discount on the first month",
            "By the way, this month the first month comes with a 20% discount for new families.",
        ),
        CtaKind::Trial => (
            "offer a free trial lesson so the child can see the format with no commitment",
            "If you'd like, we can set up a free trial lesson so your child can try the format first.",
        ),
        CtaKind::SignUp => (
            "offer to complete the enrollment right now",
            "We can complete the enrollment today, it takes about five minutes on brightkids.school.",
        ),
    };
    let placement = if at_start {
        "Open the reply with this offer in one natural sentence, then answer the questions."
    } else {
        "Close the reply with this offer in one natural sentence."
    };
    format!(
        "Add a call to action: {what}. {placement} Example of the register: \"{example}\" \
         With the call to action the reply may run up to 150 words but must stay above 120."
    )
}

/// Builds the user prompt: documents, history window, questions, and the
/// original message.
#[must_use]
pub fn build_user_prompt(
    result: &RouterResult,
    document_bodies: &[(String, String)],
    history: &[Turn],
) -> String {
    let mut prompt = String::new();

    prompt.push_str("REFERENCE DOCUMENTS:\n");
    for (id, body) in document_bodies {
        prompt.push_str(&format!("--- {id} ---\n{body}\n"));
    }

    let window: Vec<&Turn> = history.iter().rev().take(HISTORY_WINDOW).rev().collect();
    if !window.is_empty() {
        prompt.push_str("\nCONVERSATION SO FAR:\n");
        for turn in window {
            prompt.push_str(&format!("{}: {}\n", turn.role.as_str(), turn.content));
        }
    }

    prompt.push_str("\nQUESTIONS TO ANSWER:\n");
    for (i, q) in result.decomposed_questions.iter().enumerate() {
        prompt.push_str(&format!("{}. {q}\n", i + 1));
    }

    prompt.push_str(&format!("\nPARENT'S MESSAGE: {}\n", result.original_message));
    prompt.push_str("\nWrite the reply now.");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RouterStatus;

    fn sample_result() -> RouterResult {
        RouterResult {
            status: RouterStatus::Success,
            documents: vec!["pricing.md".to_string()],
            decomposed_questions: vec!["What do the plans cost?".to_string()],
            user_signal: Some(UserSignal::PriceSensitive),
            social_context: None,
            message: None,
            original_message: "how much is it".to_string(),
        }
    }

    #[test]
    fn test_build_user_prompt_sections() {
        let result = sample_result();
        let bodies = vec![("pricing.md".to_string(), "Plans start at $49.".to_string())];
        let history = vec![Turn::user("hi"), Turn::assistant("Hello")];
        let prompt = build_user_prompt(&result, &bodies, &history);
        assert!(prompt.contains("--- pricing.md ---"));
        assert!(prompt.contains("Plans start at $49."));
        assert!(prompt.contains("1. What do the plans cost?"));
        assert!(prompt.contains("PARENT'S MESSAGE: how much is it"));
        assert!(prompt.contains("user: hi"));
    }

    #[test]
    fn test_history_window_is_bounded() {
        let result = sample_result();
        let history: Vec<Turn> =
            (0..30).map(|i| Turn::user(format!("message {i}"))).collect();
        let prompt = build_user_prompt(&result, &[], &history);
        assert!(!prompt.contains("message 19"));
        assert!(prompt.contains("message 20"));
        assert!(prompt.contains("message 29"));
    }

    #[test]
    fn test_tone_block_varies_by_signal() {
        assert!(tone_block(Some(UserSignal::PriceSensitive)).contains("budget"));
        assert!(tone_block(Some(UserSignal::AnxietyAboutChild)).contains("Reassure"));
        assert_eq!(tone_block(None), "Tone: neutral and helpful.");
    }

    #[test]
    fn test_cta_block_placement() {
        let start = cta_block(CtaKind::Discount, true);
        assert!(start.contains("Open the reply"));
        let end = cta_block(CtaKind::Trial, false);
        assert!(end.contains("Close the reply"));
        assert!(end.contains("trial lesson"));
    }
}
