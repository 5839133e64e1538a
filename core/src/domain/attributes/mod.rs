//! Canonical attribute adapter framework
//!
//! Vendor instrumentation conventions are translated into the canonical
//! "ag." namespace before any other processing touches a span. Adapters map
//! vendor keys to canonical keys; the feature dispatcher then routes each
//! canonical key into its bucket of the attribute bag.
//!
//! Canonical namespace layout:
//! - ag.type.trace / ag.type.node: classification hints
//! - ag.data.{inputs,outputs,internals}.*: payloads
//! - ag.metrics.{acc,unit}.*: numeric metrics
//! - ag.flags.* / ag.tags.* / ag.meta.* / ag.exception.* / ag.refs.*

use std::collections::HashMap;

use serde_json::Value as JsonValue;

use crate::data::types::{CanonicalAttributes, SpanType, TraceType};

pub mod openinference;

pub use openinference::OpenInferenceAdapter;

// ============================================================================
// CANONICAL KEY PREFIXES
// ============================================================================

pub const KEY_TYPE_TRACE: &str = "ag.type.trace";
pub const KEY_TYPE_NODE: &str = "ag.type.node";
pub const PREFIX_DATA: &str = "ag.data.";
pub const PREFIX_METRICS_ACC: &str = "ag.metrics.acc.";
pub const PREFIX_METRICS_UNIT: &str = "ag.metrics.unit.";
pub const PREFIX_FLAGS: &str = "ag.flags.";
pub const PREFIX_TAGS: &str = "ag.tags.";
pub const PREFIX_META: &str = "ag.meta.";
pub const PREFIX_EXCEPTION: &str = "ag.exception.";
pub const PREFIX_REFS: &str = "ag.refs.";

// ============================================================================
// ADAPTER TRAIT
// ============================================================================

/// Translates one vendor convention into the canonical attribute bag.
///
/// Adapters must be pure per span: no state carried between spans, no
/// ordering dependency between adapters.
pub trait AttributeAdapter: Send + Sync {
    /// Adapter name for logging
    fn name(&self) -> &'static str;

    /// Whether this adapter recognizes the raw attribute map
    fn detect(&self, raw: &HashMap<String, JsonValue>) -> bool;

    /// Translate raw vendor attributes into the canonical bag
    fn process(&self, raw: &HashMap<String, JsonValue>, bag: &mut CanonicalAttributes);
}

/// The default adapter chain applied to every ingested span
pub fn default_adapters() -> Vec<Box<dyn AttributeAdapter>> {
    vec![Box::new(OpenInferenceAdapter)]
}

/// Run the first matching adapter over a raw attribute map. Raw maps already
/// carrying canonical keys are dispatched directly.
pub fn canonicalize(
    adapters: &[Box<dyn AttributeAdapter>],
    raw: &HashMap<String, JsonValue>,
    bag: &mut CanonicalAttributes,
) {
    for adapter in adapters {
        if adapter.detect(raw) {
            tracing::trace!(adapter = adapter.name(), "Translating vendor attributes");
            adapter.process(raw, bag);
            return;
        }
    }

    // No vendor convention detected; treat keys as already canonical
    for (key, value) in raw {
        dispatch(key, value.clone(), bag);
    }
}

// ============================================================================
// FEATURE DISPATCH
// ============================================================================

/// Route one canonical key into its feature bucket.
///
/// Metric keys require numeric values; non-numeric metric values are logged
/// and skipped rather than failing the span. Keys matching no feature land
/// in `unsupported`.
pub fn dispatch(key: &str, value: JsonValue, bag: &mut CanonicalAttributes) {
    match key {
        KEY_TYPE_TRACE => {
            match parse_trace_type(&value) {
                Some(t) => bag.types.trace = Some(t),
                None => tracing::warn!(key, value = %value, "Unrecognized trace type"),
            }
            return;
        }
        KEY_TYPE_NODE => {
            match parse_span_type(&value) {
                Some(t) => bag.types.node = Some(t),
                None => tracing::warn!(key, value = %value, "Unrecognized node type"),
            }
            return;
        }
        _ => {}
    }

    if let Some(rest) = key.strip_prefix(PREFIX_DATA) {
        bag.data.insert(rest.to_string(), value);
    } else if let Some(rest) = key.strip_prefix(PREFIX_METRICS_ACC) {
        match numeric(&value) {
            Some(n) => {
                bag.metrics.acc.insert(rest.to_string(), n);
            }
            None => tracing::warn!(key, value = %value, "Skipping non-numeric metric"),
        }
    } else if let Some(rest) = key.strip_prefix(PREFIX_METRICS_UNIT) {
        match numeric(&value) {
            Some(n) => {
                bag.metrics.unit.insert(rest.to_string(), n);
            }
            None => tracing::warn!(key, value = %value, "Skipping non-numeric metric"),
        }
    } else if let Some(rest) = key.strip_prefix(PREFIX_FLAGS) {
        bag.flags.insert(rest.to_string(), value);
    } else if let Some(rest) = key.strip_prefix(PREFIX_TAGS) {
        bag.tags.insert(rest.to_string(), value);
    } else if let Some(rest) = key.strip_prefix(PREFIX_META) {
        bag.meta.insert(rest.to_string(), value);
    } else if let Some(rest) = key.strip_prefix(PREFIX_EXCEPTION) {
        bag.exception.insert(rest.to_string(), value);
    } else if let Some(rest) = key.strip_prefix(PREFIX_REFS) {
        bag.references.insert(rest.to_string(), value);
    } else {
        tracing::trace!(key, "Unsupported attribute key");
        bag.unsupported.insert(key.to_string(), value);
    }
}

fn parse_trace_type(value: &JsonValue) -> Option<TraceType> {
    match value.as_str()?.to_lowercase().as_str() {
        "invocation" => Some(TraceType::Invocation),
        "annotation" => Some(TraceType::Annotation),
        "unknown" => Some(TraceType::Unknown),
        _ => None,
    }
}

fn parse_span_type(value: &JsonValue) -> Option<SpanType> {
    match value.as_str()?.to_lowercase().as_str() {
        "agent" => Some(SpanType::Agent),
        "chain" => Some(SpanType::Chain),
        "workflow" => Some(SpanType::Workflow),
        "task" => Some(SpanType::Task),
        "tool" => Some(SpanType::Tool),
        "embedding" => Some(SpanType::Embedding),
        "query" => Some(SpanType::Query),
        "llm" => Some(SpanType::Llm),
        "completion" => Some(SpanType::Completion),
        "chat" => Some(SpanType::Chat),
        "rerank" => Some(SpanType::Rerank),
        "unknown" => Some(SpanType::Unknown),
        _ => None,
    }
}

/// Coerce a JSON value to f64. Accepts numbers and numeric strings.
fn numeric(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dispatch_type_keys() {
        let mut bag = CanonicalAttributes::default();
        dispatch(KEY_TYPE_TRACE, json!("invocation"), &mut bag);
        dispatch(KEY_TYPE_NODE, json!("chat"), &mut bag);
        assert_eq!(bag.types.trace, Some(TraceType::Invocation));
        assert_eq!(bag.types.node, Some(SpanType::Chat));
    }

    #[test]
    fn test_dispatch_unrecognized_type_is_skipped() {
        let mut bag = CanonicalAttributes::default();
        dispatch(KEY_TYPE_NODE, json!("starship"), &mut bag);
        assert_eq!(bag.types.node, None);
    }

    #[test]
    fn test_dispatch_buckets() {
        let mut bag = CanonicalAttributes::default();
        dispatch("ag.data.inputs.prompt", json!("hi"), &mut bag);
        dispatch("ag.metrics.unit.tokens.prompt", json!(12), &mut bag);
        dispatch("ag.flags.cached", json!(true), &mut bag);
        dispatch("ag.tags.values", json!(["a", "b"]), &mut bag);
        dispatch("ag.meta.request.model", json!("gpt-4o"), &mut bag);
        dispatch("ag.exception.message", json!("boom"), &mut bag);
        dispatch("ag.refs.testset.id", json!("ts-1"), &mut bag);

        assert_eq!(bag.data.get("inputs.prompt"), Some(&json!("hi")));
        assert_eq!(bag.metrics.unit.get("tokens.prompt"), Some(&12.0));
        assert_eq!(bag.flags.get("cached"), Some(&json!(true)));
        assert_eq!(bag.tags.get("values"), Some(&json!(["a", "b"])));
        assert_eq!(bag.meta.get("request.model"), Some(&json!("gpt-4o")));
        assert_eq!(bag.exception.get("message"), Some(&json!("boom")));
        assert_eq!(bag.references.get("testset.id"), Some(&json!("ts-1")));
    }

    #[test]
    fn test_dispatch_numeric_string_metric() {
        let mut bag = CanonicalAttributes::default();
        dispatch("ag.metrics.unit.costs.total", json!("0.25"), &mut bag);
        assert_eq!(bag.metrics.unit.get("costs.total"), Some(&0.25));
    }

    #[test]
    fn test_dispatch_non_numeric_metric_is_skipped() {
        let mut bag = CanonicalAttributes::default();
        dispatch("ag.metrics.acc.costs.total", json!("lots"), &mut bag);
        assert!(bag.metrics.acc.is_empty());
    }

    #[test]
    fn test_dispatch_unknown_key_goes_to_unsupported() {
        let mut bag = CanonicalAttributes::default();
        dispatch("ag.mystery.key", json!(1), &mut bag);
        assert_eq!(bag.unsupported.get("ag.mystery.key"), Some(&json!(1)));
    }

    #[test]
    fn test_canonicalize_without_vendor_keys_dispatches_directly() {
        let adapters = default_adapters();
        let mut raw = HashMap::new();
        raw.insert("ag.meta.request.model".to_string(), json!("gpt-4o"));
        let mut bag = CanonicalAttributes::default();
        canonicalize(&adapters, &raw, &mut bag);
        assert_eq!(bag.meta.get("request.model"), Some(&json!("gpt-4o")));
    }
}
