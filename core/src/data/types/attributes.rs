//! Canonical attribute bag
//!
//! Vendor attribute conventions are translated into one neutral namespace
//! before any other processing. The bag groups values into fixed features:
//! data payloads, accumulated/unit metrics, flags, tags, metadata, exception
//! details and reference pointers. Keys that match no feature land in
//! `unsupported` so nothing is silently dropped.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::span::{SpanType, TraceType};

// ============================================================================
// FEATURE BUCKETS
// ============================================================================

/// Canonical type hints carried in the attribute namespace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct NodeTypes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<TraceType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<SpanType>,
}

/// Numeric metrics split into subtree-accumulated and own-span values.
///
/// Keys are dotted paths relative to the bucket, e.g. "costs.total" or
/// "tokens.prompt". BTreeMap keeps encoding deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MetricsBag {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub acc: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub unit: BTreeMap<String, f64>,
}

/// The full canonical bag attached to every normalized span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CanonicalAttributes {
    #[serde(default, skip_serializing_if = "node_types_is_empty")]
    pub types: NodeTypes,
    /// Inputs/outputs/internals payloads, keyed by dotted path
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, JsonValue>,
    #[serde(default, skip_serializing_if = "metrics_is_empty")]
    pub metrics: MetricsBag,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub flags: BTreeMap<String, JsonValue>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, JsonValue>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, JsonValue>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub exception: BTreeMap<String, JsonValue>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub references: BTreeMap<String, JsonValue>,
    /// Canonically-prefixed keys that matched no known feature
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub unsupported: BTreeMap<String, JsonValue>,
}

fn node_types_is_empty(t: &NodeTypes) -> bool {
    t.trace.is_none() && t.node.is_none()
}

fn metrics_is_empty(m: &MetricsBag) -> bool {
    m.acc.is_empty() && m.unit.is_empty()
}

impl CanonicalAttributes {
    /// Model identifier for cost lookup, preferring the response-side model
    /// over the requested one.
    pub fn model_id(&self) -> Option<&str> {
        self.meta
            .get("response.model")
            .or_else(|| self.meta.get("request.model"))
            .and_then(JsonValue::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_model_id_prefers_response_model() {
        let mut bag = CanonicalAttributes::default();
        bag.meta
            .insert("request.model".into(), json!("gpt-4o-mini"));
        assert_eq!(bag.model_id(), Some("gpt-4o-mini"));

        bag.meta.insert("response.model".into(), json!("gpt-4o"));
        assert_eq!(bag.model_id(), Some("gpt-4o"));
    }

    #[test]
    fn test_empty_bag_serializes_to_empty_object() {
        let bag = CanonicalAttributes::default();
        let json = serde_json::to_value(&bag).unwrap();
        assert_eq!(json, json!({}));
    }

    #[test]
    fn test_round_trip_preserves_metrics() {
        let mut bag = CanonicalAttributes::default();
        bag.metrics.unit.insert("costs.total".into(), 0.25);
        bag.metrics.acc.insert("tokens.total".into(), 42.0);
        let encoded = serde_json::to_string(&bag).unwrap();
        let decoded: CanonicalAttributes = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, bag);
    }
}
