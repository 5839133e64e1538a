//! Tests for the OpenInference adapter

use std::collections::HashMap;

use serde_json::{json, Value as JsonValue};

use crate::data::types::{CanonicalAttributes, SpanType};
use crate::domain::attributes::AttributeAdapter;

use super::OpenInferenceAdapter;

fn run(pairs: &[(&str, JsonValue)]) -> CanonicalAttributes {
    let raw: HashMap<String, JsonValue> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    let mut bag = CanonicalAttributes::default();
    OpenInferenceAdapter.process(&raw, &mut bag);
    bag
}

#[test]
fn test_detect() {
    let adapter = OpenInferenceAdapter;
    let mut raw = HashMap::new();
    raw.insert("http.method".to_string(), json!("GET"));
    assert!(!adapter.detect(&raw));

    raw.insert("openinference.span.kind".to_string(), json!("LLM"));
    assert!(adapter.detect(&raw));
}

#[test]
fn test_span_kind_mapping() {
    let bag = run(&[("openinference.span.kind", json!("LLM"))]);
    assert_eq!(bag.types.node, Some(SpanType::Chat));

    let bag = run(&[("openinference.span.kind", json!("RETRIEVER"))]);
    assert_eq!(bag.types.node, Some(SpanType::Query));

    let bag = run(&[("openinference.span.kind", json!("GUARDRAIL"))]);
    assert_eq!(bag.types.node, Some(SpanType::Task));

    let bag = run(&[("openinference.span.kind", json!("agent"))]);
    assert_eq!(bag.types.node, Some(SpanType::Agent));
}

#[test]
fn test_unmapped_span_kind_is_skipped() {
    let bag = run(&[("openinference.span.kind", json!("TELEPORTER"))]);
    assert_eq!(bag.types.node, None);

    let bag = run(&[("openinference.span.kind", json!(42))]);
    assert_eq!(bag.types.node, None);
}

#[test]
fn test_input_output_values() {
    let bag = run(&[
        ("input.value", json!("what is rust?")),
        ("output.value", json!("a systems language")),
    ]);
    assert_eq!(bag.data.get("inputs"), Some(&json!("what is rust?")));
    assert_eq!(bag.data.get("outputs"), Some(&json!("a systems language")));
}

#[test]
fn test_model_name_fans_out() {
    let bag = run(&[("llm.model_name", json!("gpt-4o"))]);
    assert_eq!(bag.meta.get("request.model"), Some(&json!("gpt-4o")));
    assert_eq!(bag.meta.get("response.model"), Some(&json!("gpt-4o")));
}

#[test]
fn test_token_counts_become_unit_metrics() {
    let bag = run(&[
        ("llm.token_count.prompt", json!(128)),
        ("llm.token_count.completion", json!(64)),
        ("llm.token_count.total", json!(192)),
    ]);
    assert_eq!(bag.metrics.unit.get("tokens.prompt"), Some(&128.0));
    assert_eq!(bag.metrics.unit.get("tokens.completion"), Some(&64.0));
    assert_eq!(bag.metrics.unit.get("tokens.total"), Some(&192.0));
}

#[test]
fn test_reported_costs_become_unit_metrics() {
    let bag = run(&[("llm.cost.total", json!(0.0125))]);
    assert_eq!(bag.metrics.unit.get("costs.total"), Some(&0.0125));
}

#[test]
fn test_message_list_suffix_rewriting() {
    let bag = run(&[
        ("llm.input_messages.0.message.role", json!("user")),
        ("llm.input_messages.0.message.content", json!("hello")),
        ("llm.output_messages.0.message.content", json!("hi there")),
    ]);
    assert_eq!(bag.data.get("inputs.prompt.0.role"), Some(&json!("user")));
    assert_eq!(
        bag.data.get("inputs.prompt.0.content"),
        Some(&json!("hello"))
    );
    assert_eq!(
        bag.data.get("outputs.completion.0.content"),
        Some(&json!("hi there"))
    );
}

#[test]
fn test_message_suffix_kept_when_not_indexed() {
    let bag = run(&[("llm.input_messages.summary", json!("n/a"))]);
    assert_eq!(bag.data.get("inputs.prompt.summary"), Some(&json!("n/a")));
}

#[test]
fn test_structured_messages_shadow_flat_payload() {
    let bag = run(&[
        ("openinference.span.kind", json!("LLM")),
        ("input.value", json!("flat prompt")),
        ("llm.input_messages.0.message.content", json!("hello")),
        ("output.value", json!("flat completion")),
        ("llm.output_messages.0.message.content", json!("hi")),
    ]);
    assert!(bag.data.get("inputs").is_none());
    assert!(bag.data.get("outputs").is_none());
    assert_eq!(
        bag.data.get("inputs.prompt.0.content"),
        Some(&json!("hello"))
    );
}

#[test]
fn test_flat_payload_kept_on_non_completion_nodes() {
    let bag = run(&[
        ("openinference.span.kind", json!("CHAIN")),
        ("input.value", json!("flat prompt")),
        ("llm.input_messages.0.message.content", json!("hello")),
    ]);
    assert_eq!(bag.data.get("inputs"), Some(&json!("flat prompt")));
}

#[test]
fn test_retrieval_and_embedding_prefixes() {
    let bag = run(&[
        ("retrieval.documents.0.document.content", json!("doc")),
        ("embedding.embeddings.0.embedding.vector", json!([0.1, 0.2])),
        ("tool.name", json!("calculator")),
    ]);
    assert_eq!(
        bag.data.get("outputs.documents.0.document.content"),
        Some(&json!("doc"))
    );
    assert_eq!(
        bag.data.get("internals.embeddings.0.embedding.vector"),
        Some(&json!([0.1, 0.2]))
    );
    assert_eq!(bag.meta.get("tool.name"), Some(&json!("calculator")));
}

#[test]
fn test_session_tags_metadata_exception() {
    let bag = run(&[
        ("session.id", json!("sess-1")),
        ("user.id", json!("user-1")),
        ("tag.tags", json!(["prod", "eu"])),
        ("metadata", json!({"run": 7})),
        ("exception.message", json!("boom")),
    ]);
    assert_eq!(bag.meta.get("session.id"), Some(&json!("sess-1")));
    assert_eq!(bag.meta.get("user.id"), Some(&json!("user-1")));
    assert_eq!(bag.tags.get("values"), Some(&json!(["prod", "eu"])));
    assert_eq!(bag.meta.get("custom"), Some(&json!({"run": 7})));
    assert_eq!(bag.exception.get("message"), Some(&json!("boom")));
}

#[test]
fn test_unmatched_keys_are_dropped() {
    let bag = run(&[
        ("openinference.span.kind", json!("LLM")),
        ("http.method", json!("POST")),
        ("toolkit.name", json!("not a tool key")),
    ]);
    assert!(bag.unsupported.is_empty());
    assert!(bag.meta.get("tool.name").is_none());
}

#[test]
fn test_canonical_keys_pass_through() {
    let bag = run(&[
        ("openinference.span.kind", json!("LLM")),
        ("ag.flags.cached", json!(true)),
    ]);
    assert_eq!(bag.flags.get("cached"), Some(&json!(true)));
}
