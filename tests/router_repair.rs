//! Table-driven tests for the router response repair pipeline: parsing,
//! downgrades, overrides, and document invariants over realistic malformed
//! model output.

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use educhat::models::{RouterResult, RouterStatus, SocialContext, UserSignal};
use educhat::router::{
    downgrade_overlong_success, enforce_document_invariants, fallback_documents,
    override_unsupported_simplification, parse_router_response, validate_reply_message,
    ParseOutcome, OFFTOPIC_MESSAGE, SIMPLIFICATION_MESSAGE,
};
use test_case::test_case;

fn parse_ok(response: &str) -> RouterResult {
    match parse_router_response(response, "original message") {
        ParseOutcome::Parsed(result) => result,
        other => panic!("expected Parsed, got {other:?}"),
    }
}

// ============================================================================
// Parsing
// ============================================================================

#[test_case(r#"{"status": "success", "documents": ["pricing.md"], "decomposed_questions": ["q1"]}"#; "bare json")]
#[test_case("```json\n{\"status\": \"success\", \"documents\": [\"pricing.md\"], \"decomposed_questions\": [\"q1\"]}\n```"; "fenced json")]
#[test_case("Here is the classification:\n{\"status\": \"success\", \"documents\": [\"pricing.md\"], \"decomposed_questions\": [\"q1\"]}"; "json after prose")]
fn test_parse_extracts_json(response: &str) {
    let result = parse_ok(response);
    assert_eq!(result.status, RouterStatus::Success);
    assert_eq!(result.documents, vec!["pricing.md"]);
}

#[test_case("offtopic", RouterStatus::Offtopic; "canonical offtopic")]
#[test_case("off_topic", RouterStatus::Offtopic; "underscored offtopic")]
#[test_case("need_simplification", RouterStatus::NeedSimplification; "canonical simplification")]
#[test_case("success", RouterStatus::Success; "canonical success")]
fn test_parse_status_aliases(status: &str, expected: RouterStatus) {
    let result = parse_ok(&format!(r#"{{"status": "{status}"}}"#));
    assert_eq!(result.status, expected);
}

#[test]
fn test_signal_in_status_slot_is_remapped() {
    // The model sometimes answers with the user_signal enum in the status
    // field; that means it classified successfully
    let result = parse_ok(r#"{"status": "price_sensitive", "documents": ["pricing.md"], "decomposed_questions": ["q"]}"#);
    assert_eq!(result.status, RouterStatus::Success);
    assert_eq!(result.user_signal, Some(UserSignal::PriceSensitive));
}

#[test]
fn test_single_string_question_coerced_to_list() {
    let result = parse_ok(r#"{"status": "success", "documents": ["faq.md"], "decomposed_questions": "just one question"}"#);
    assert_eq!(result.decomposed_questions, vec!["just one question"]);
}

#[test]
fn test_malformed_question_list_degrades_to_empty() {
    let result = parse_ok(r#"{"status": "success", "documents": ["faq.md"], "decomposed_questions": {"oops": 1}}"#);
    assert!(result.decomposed_questions.is_empty());
}

#[test_case(""; "empty string")]
#[test_case("   \n  "; "whitespace only")]
fn test_empty_response(response: &str) {
    assert!(matches!(
        parse_router_response(response, "msg"),
        ParseOutcome::EmptyResponse
    ));
}

#[test_case(r#"{"documents": ["pricing.md"]}"#; "missing status")]
#[test_case(r#"{"status": "banana"}"#; "unknown status")]
#[test_case("not json at all"; "no json")]
fn test_schema_errors(response: &str) {
    assert!(matches!(
        parse_router_response(response, "msg"),
        ParseOutcome::SchemaError(_)
    ));
}

#[test]
fn test_social_context_aliases() {
    let result = parse_ok(r#"{"status": "offtopic", "social_context": "goodbye"}"#);
    assert_eq!(result.social_context, Some(SocialContext::Farewell));
}

// ============================================================================
// Downgrades and overrides
// ============================================================================

#[test]
fn test_overlong_success_downgraded() {
    let mut result = parse_ok(r#"{"status": "success", "documents": ["faq.md"], "decomposed_questions": ["a", "b", "c", "d"]}"#);
    result = downgrade_overlong_success(result);
    assert_eq!(result.status, RouterStatus::NeedSimplification);
    assert!(result.documents.is_empty());
    assert_eq!(result.message.as_deref(), Some(SIMPLIFICATION_MESSAGE));
}

#[test]
fn test_exactly_three_questions_stays_success() {
    let mut result = parse_ok(r#"{"status": "success", "documents": ["faq.md"], "decomposed_questions": ["a", "b", "c"]}"#);
    result = downgrade_overlong_success(result);
    assert_eq!(result.status, RouterStatus::Success);
}

#[test]
fn test_unjustified_simplification_forced_to_success() {
    let known = ["pricing.md", "faq.md", "partners.md"];
    let mut result = parse_ok(r#"{"status": "need_simplification", "decomposed_questions": ["how much is it"]}"#);
    result.original_message = "how much does the course cost".to_string();
    let result = override_unsupported_simplification(result, &known);
    assert_eq!(result.status, RouterStatus::Success);
    assert_eq!(result.documents, vec!["pricing.md"]);
    assert!(result.message.is_none());
}

#[test]
fn test_justified_simplification_untouched() {
    let known = ["pricing.md", "faq.md"];
    let result = parse_ok(r#"{"status": "need_simplification", "decomposed_questions": ["a", "b", "c", "d", "e"], "message": "one at a time please"}"#);
    let result = override_unsupported_simplification(result, &known);
    assert_eq!(result.status, RouterStatus::NeedSimplification);
}

#[test_case("how much does it cost", &["pricing.md"]; "price keywords")]
#[test_case("do you have a partner program", &["partners.md"]; "partner keywords")]
#[test_case("random question about lessons", &["faq.md"]; "generic fallback")]
fn test_fallback_documents(message: &str, expected: &[&str]) {
    let known = ["pricing.md", "faq.md", "partners.md", "courses.md"];
    assert_eq!(fallback_documents(message, &known), expected);
}

#[test]
fn test_fallback_documents_intersects_corpus() {
    // pricing.md missing from the corpus: nothing to ground on
    let known = ["faq.md"];
    assert!(fallback_documents("what is the price", &known).is_empty());
}

// ============================================================================
// Document invariants and final validation
// ============================================================================

#[test]
fn test_documents_deduplicated_and_capped() {
    let mut result = parse_ok(r#"{"status": "success", "documents": ["a.md", "b.md", "a.md", "c.md", "d.md", "e.md"], "decomposed_questions": ["q"]}"#);
    result = enforce_document_invariants(result);
    assert_eq!(result.documents, vec!["a.md", "b.md", "c.md", "d.md"]);
}

#[test]
fn test_success_without_documents_becomes_offtopic() {
    let mut result = parse_ok(r#"{"status": "success", "decomposed_questions": ["q"], "user_signal": "exploring_only"}"#);
    result = enforce_document_invariants(result);
    assert_eq!(result.status, RouterStatus::Offtopic);
    // Signal survives the downgrade
    assert_eq!(result.user_signal, Some(UserSignal::ExploringOnly));
}

#[test]
fn test_offtopic_always_gets_canned_message() {
    let result = parse_ok(r#"{"status": "offtopic", "message": "model-invented text"}"#);
    let result = validate_reply_message(result).expect("offtopic is always valid");
    assert_eq!(result.message.as_deref(), Some(OFFTOPIC_MESSAGE));
}

#[test]
fn test_simplification_without_message_is_invalid() {
    let result = parse_ok(r#"{"status": "need_simplification", "decomposed_questions": ["a", "b", "c", "d"]}"#);
    assert!(validate_reply_message(result).is_none());
}

#[test]
fn test_simplification_with_message_is_valid() {
    let result = parse_ok(r#"{"status": "need_simplification", "decomposed_questions": ["a", "b", "c", "d"], "message": "one at a time"}"#);
    assert!(validate_reply_message(result).is_some());
}
