//! Shared data types for the span store

pub mod attributes;
pub mod query;
pub mod span;

pub use attributes::{CanonicalAttributes, MetricsBag, NodeTypes};
pub use query::{
    AnalyticsBucket, Filtering, Grouping, GroupingFocus, MetricSpec, Pagination, QueryError,
    SpanQuery,
};
pub use span::{
    FlatSpan, Lifecycle, Reference, Span, SpanEvent, SpanKind, SpanLink, SpanType, Status,
    StatusCode, TraceType,
};
