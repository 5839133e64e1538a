//! Span data model
//!
//! A span is one timed unit of execution telemetry; the set of spans sharing
//! a trace_id forms a tree (logically a forest rooted at spans without a
//! parent_id). Spans are stored flat; the `children` field is populated only
//! for hierarchical (query-time) serialization.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::attributes::CanonicalAttributes;

// ============================================================================
// CLASSIFICATION ENUMS
// ============================================================================

/// High-level trace classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TraceType {
    Invocation,
    Annotation,
    #[default]
    Unknown,
}

impl TraceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Invocation => "invocation",
            Self::Annotation => "annotation",
            Self::Unknown => "unknown",
        }
    }
}

/// Node types for LLM telemetry spans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpanType {
    Agent,
    Chain,
    Workflow,
    Task,
    Tool,
    Embedding,
    Query,
    Llm,
    Completion,
    Chat,
    Rerank,
    #[default]
    Unknown,
}

impl SpanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Chain => "chain",
            Self::Workflow => "workflow",
            Self::Task => "task",
            Self::Tool => "tool",
            Self::Embedding => "embedding",
            Self::Query => "query",
            Self::Llm => "llm",
            Self::Completion => "completion",
            Self::Chat => "chat",
            Self::Rerank => "rerank",
            Self::Unknown => "unknown",
        }
    }

    /// Completion-like nodes carry prompt/completion message lists in their
    /// data buckets.
    pub fn is_completion_like(&self) -> bool {
        matches!(self, Self::Completion | Self::Chat)
    }
}

/// OTel span kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpanKind {
    Internal,
    Server,
    Client,
    Producer,
    Consumer,
    #[default]
    Unspecified,
}

impl SpanKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::Server => "server",
            Self::Client => "client",
            Self::Producer => "producer",
            Self::Consumer => "consumer",
            Self::Unspecified => "unspecified",
        }
    }
}

/// OTel status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StatusCode {
    #[default]
    Unset,
    Ok,
    Error,
}

impl StatusCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unset => "unset",
            Self::Ok => "ok",
            Self::Error => "error",
        }
    }
}

// ============================================================================
// SUB-RECORDS
// ============================================================================

/// Span status (code + optional message)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Status {
    #[serde(default)]
    pub code: StatusCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// External pointer carried on a span (testset, application, evaluator, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Reference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Pointer to another span (link) and the identity returned by writes
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct SpanLink {
    pub trace_id: String,
    pub span_id: String,
}

/// Timestamped sub-record attached to a span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SpanEvent {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, JsonValue>,
}

/// Creation/update/deletion audit fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Lifecycle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_by_id: Option<String>,
}

// ============================================================================
// SPAN
// ============================================================================

/// Normalized, canonically-typed span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Span {
    // Identity
    pub trace_id: String,
    pub span_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    // Classification
    #[serde(default)]
    pub trace_type: TraceType,
    #[serde(default)]
    pub span_type: SpanType,
    #[serde(default)]
    pub span_kind: SpanKind,
    pub name: String,

    // Time
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,

    // Status
    #[serde(default)]
    pub status: Status,

    // Canonical attributes
    #[serde(default)]
    pub attributes: CanonicalAttributes,

    // Pointers and sub-records
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<Reference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<SpanLink>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<SpanEvent>,

    // Audit
    #[serde(default)]
    pub lifecycle: Lifecycle,

    // Materialized subtree; populated only for hierarchical serialization,
    // never persisted flat.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Span>,
}

impl Span {
    pub fn link(&self) -> SpanLink {
        SpanLink {
            trace_id: self.trace_id.clone(),
            span_id: self.span_id.clone(),
        }
    }
}

// ============================================================================
// FLAT SPAN (INGESTION INPUT)
// ============================================================================

/// Already-decoded flat span as delivered by a producer, with the vendor
/// attribute map untranslated. OTLP wire decoding happens upstream.
#[derive(Debug, Clone, Default)]
pub struct FlatSpan {
    pub trace_id: String,
    pub span_id: String,
    pub parent_id: Option<String>,

    pub trace_type: Option<TraceType>,
    pub span_type: Option<SpanType>,
    pub span_kind: Option<SpanKind>,
    pub name: Option<String>,

    pub start_time_unix_nano: Option<u64>,
    pub end_time_unix_nano: Option<u64>,

    pub status_code: Option<StatusCode>,
    pub status_message: Option<String>,

    /// Vendor-specific flat attributes (tagged JSON values)
    pub attributes: HashMap<String, JsonValue>,

    pub references: Vec<Reference>,
    pub links: Vec<SpanLink>,
    pub events: Vec<SpanEvent>,

    pub created_by_id: Option<String>,
}
