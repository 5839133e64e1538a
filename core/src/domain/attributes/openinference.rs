//! OpenInference convention adapter
//!
//! Translates OpenInference flat span attributes (Arize Phoenix and related
//! instrumentors) into the canonical namespace. Mapping is rule-driven:
//! exact-key rules first, then ordered prefix rules with message-list index
//! rewriting, then feature dispatch.

use std::collections::HashMap;
use std::sync::OnceLock;

use serde_json::Value as JsonValue;

use crate::data::types::{CanonicalAttributes, SpanType};

use super::{dispatch, AttributeAdapter};

// ============================================================================
// RULE TABLES
// ============================================================================

/// Exact vendor key to canonical key mappings. A vendor key may appear more
/// than once to fan out into several canonical keys.
const EXACT_RULES: &[(&str, &str)] = &[
    ("input.value", "ag.data.inputs"),
    ("output.value", "ag.data.outputs"),
    // Single model name feeds both sides; a dedicated response.model rule
    // would overwrite the second entry if an instrumentor ever emits one.
    ("llm.model_name", "ag.meta.request.model"),
    ("llm.model_name", "ag.meta.response.model"),
    ("llm.provider", "ag.meta.provider"),
    ("llm.system", "ag.meta.system"),
    ("llm.invocation_parameters", "ag.meta.request.parameters"),
    ("llm.token_count.prompt", "ag.metrics.unit.tokens.prompt"),
    ("llm.token_count.completion", "ag.metrics.unit.tokens.completion"),
    ("llm.token_count.total", "ag.metrics.unit.tokens.total"),
    ("llm.cost.prompt", "ag.metrics.unit.costs.prompt"),
    ("llm.cost.completion", "ag.metrics.unit.costs.completion"),
    ("llm.cost.total", "ag.metrics.unit.costs.total"),
    ("session.id", "ag.meta.session.id"),
    ("user.id", "ag.meta.user.id"),
    ("tag.tags", "ag.tags.values"),
    ("metadata", "ag.meta.custom"),
    ("exception.type", "ag.exception.type"),
    ("exception.message", "ag.exception.message"),
    ("exception.stacktrace", "ag.exception.stacktrace"),
    ("exception.escaped", "ag.exception.escaped"),
];

/// Ordered prefix rules: (vendor prefix, canonical prefix, message list).
/// Message-list prefixes carry indexed ".N.message.field" suffixes that are
/// rewritten to ".N.field".
const PREFIX_RULES: &[(&str, &str, bool)] = &[
    ("llm.input_messages", "ag.data.inputs.prompt", true),
    ("llm.output_messages", "ag.data.outputs.completion", true),
    ("llm.prompt_template.variables", "ag.data.inputs.variables", false),
    ("retrieval.documents", "ag.data.outputs.documents", false),
    ("embedding.embeddings", "ag.data.internals.embeddings", false),
    ("tool", "ag.meta.tool", false),
];

const SPAN_KIND_KEY: &str = "openinference.span.kind";

/// Maps an OpenInference span kind to the canonical node type
fn map_span_kind(kind: &str) -> Option<SpanType> {
    match kind.to_uppercase().as_str() {
        "AGENT" => Some(SpanType::Agent),
        "CHAIN" => Some(SpanType::Chain),
        "LLM" => Some(SpanType::Chat),
        "EMBEDDING" => Some(SpanType::Embedding),
        "TOOL" => Some(SpanType::Tool),
        "RETRIEVER" => Some(SpanType::Query),
        "RERANKER" => Some(SpanType::Rerank),
        "GUARDRAIL" => Some(SpanType::Task),
        "EVALUATOR" => Some(SpanType::Task),
        _ => None,
    }
}

/// Rewrite an indexed message suffix ".N.message.field" to ".N.field".
/// Suffixes that do not match the pattern are kept as-is.
fn rewrite_message_suffix(suffix: &str) -> String {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        regex::Regex::new(r"^\.(\d+)\.message\.(.+)$").expect("Invalid regex")
    });

    match re.captures(suffix) {
        Some(caps) => format!(".{}.{}", &caps[1], &caps[2]),
        None => {
            tracing::debug!(suffix, "Message suffix kept verbatim");
            suffix.to_string()
        }
    }
}

// ============================================================================
// ADAPTER
// ============================================================================

pub struct OpenInferenceAdapter;

impl OpenInferenceAdapter {
    /// Translate one vendor key into zero or more canonical dispatches
    fn translate(&self, key: &str, value: &JsonValue, bag: &mut CanonicalAttributes) {
        if key == SPAN_KIND_KEY {
            match value.as_str().and_then(map_span_kind) {
                Some(node) => bag.types.node = Some(node),
                None => {
                    tracing::warn!(value = %value, "Unmapped OpenInference span kind");
                }
            }
            return;
        }

        // Keys already in the canonical namespace pass straight through
        if key.starts_with("ag.") {
            dispatch(key, value.clone(), bag);
            return;
        }

        let mut matched = false;
        for (vendor, canonical) in EXACT_RULES {
            if key == *vendor {
                dispatch(canonical, value.clone(), bag);
                matched = true;
            }
        }
        if matched {
            return;
        }

        for (vendor_prefix, canonical_prefix, message_list) in PREFIX_RULES {
            if let Some(suffix) = key.strip_prefix(vendor_prefix) {
                // Require a clean segment boundary so "tool" does not
                // swallow "toolkit.name"
                if !suffix.is_empty() && !suffix.starts_with('.') {
                    continue;
                }
                let suffix = if *message_list && !suffix.is_empty() {
                    rewrite_message_suffix(suffix)
                } else {
                    suffix.to_string()
                };
                dispatch(&format!("{canonical_prefix}{suffix}"), value.clone(), bag);
                return;
            }
        }

        // Vendor keys with no rule carry no canonicalizable signal
        tracing::trace!(key, "Unmatched OpenInference attribute, dropping");
    }

    /// Structured message lists shadow the flat input/output payloads; keep
    /// only the structured form on completion-like nodes.
    fn resolve_payload_shadowing(&self, bag: &mut CanonicalAttributes) {
        let completion_like = bag
            .types
            .node
            .map(|t| t.is_completion_like())
            .unwrap_or(false);
        if !completion_like {
            return;
        }

        if bag.data.keys().any(|k| k.starts_with("inputs.prompt.")) {
            bag.data.remove("inputs");
        }
        if bag.data.keys().any(|k| k.starts_with("outputs.completion.")) {
            bag.data.remove("outputs");
        }
    }
}

impl AttributeAdapter for OpenInferenceAdapter {
    fn name(&self) -> &'static str {
        "openinference"
    }

    fn detect(&self, raw: &HashMap<String, JsonValue>) -> bool {
        raw.keys().any(|k| {
            k == SPAN_KIND_KEY
                || k.starts_with("llm.")
                || k.starts_with("retrieval.")
                || k.starts_with("embedding.")
                || k == "input.value"
                || k == "output.value"
        })
    }

    fn process(&self, raw: &HashMap<String, JsonValue>, bag: &mut CanonicalAttributes) {
        // Span kind first so shadowing sees the node type even when map
        // iteration yields it last
        if let Some(kind) = raw.get(SPAN_KIND_KEY) {
            self.translate(SPAN_KIND_KEY, kind, bag);
        }
        for (key, value) in raw {
            if key == SPAN_KIND_KEY {
                continue;
            }
            self.translate(key, value, bag);
        }
        self.resolve_payload_shadowing(bag);
    }
}

#[cfg(test)]
#[path = "openinference_tests.rs"]
mod tests;
